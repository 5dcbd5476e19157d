//! Configuration
//!
//! Judge configuration, toolchain presets and shared types.

pub mod judge;
pub mod presets;
pub mod types;
