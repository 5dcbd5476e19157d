//! Multi-test grading
//!
//! Problem loading, the per-submission grading state machine and the worker
//! pool running independent sessions concurrently.

pub mod pool;
pub mod problem;
pub mod session;
