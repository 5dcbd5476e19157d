//! Judge adapters.
//!
//! Core runtime stays language-agnostic. Adapters define the source layout
//! and compile/run commands of each language family.

pub mod adapter;
pub mod languages;
pub mod registry;
