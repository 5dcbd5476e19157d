//! Utilities
//!
//! Output collection and the instrumentation footer format.

pub mod instrument;
pub mod output;
