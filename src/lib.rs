//! judgebox: multi-language execution and grading engine
//! Runs untrusted submissions against ordered test inputs under time, memory
//! and output ceilings, and grades them through a checker program.
//!
//! # Architecture
//!
//! Leaves first:
//!
//! ## Safety ([`safety`])
//! - [`safety::workspace`]: Run-scoped, uniquely named artifact directories
//!
//! ## Judge Adapters ([`judge`])
//! - [`judge::adapter`]: Compile/run contract and the ambiguity boundary
//! - [`judge::languages`]: Python, C++ and Java adapters
//! - [`judge::registry`]: Language to adapter mapping
//!
//! ## Execution Control ([`exec`])
//! - [`exec::supervisor`]: Process-group supervision with structured kill flags
//! - [`exec::engine`]: One run end to end, classified
//! - [`exec::request`]: The single-invocation `run` contract
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::verdict`]: Status classification over run evidence
//!
//! ## Grading ([`grader`])
//! - [`grader::problem`]: Problems, tests and the problem repository
//! - [`grader::session`]: Multi-test state machine with single retry
//! - [`grader::pool`]: Bounded worker pool for concurrent sessions
//!
//! ## Observability ([`observability`])
//! - [`observability::metrics`]: Prometheus metrics export
//!
//! ## Configuration ([`config`])
//! - [`config::judge`]: `judgebox.json` loading and validation
//! - [`config::types`]: Shared type definitions and closed enums
//! - [`config::presets`]: Language toolchain presets
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output collection
//! - [`utils::instrument`]: Footer format of an external launcher
//!
//! # Design Principles
//!
//! 1. **Structured signals over text** - Timeouts, memory and output
//!    overflow are flags from the supervisor, not sniffed from output
//! 2. **Argument vectors only** - No shell strings for compilers or programs
//! 3. **Unique workspaces** - Concurrent runs never share a path
//! 4. **Classified at the boundary** - The engine never lets an unclassified
//!    failure reach the grader

// Safety & Cleanup
pub mod safety;

// Judge adapters (language-specific compile/run commands)
pub mod judge;

// Execution Control
pub mod exec;

// Verdict classification
pub mod verdict;

// Multi-test grading
pub mod grader;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the judgebox binary.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
