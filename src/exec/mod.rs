//! Execution control
//!
//! Process supervision, the single-run engine and the invocation contract
//! layered on top of it.

pub mod engine;
pub mod request;
pub mod supervisor;
