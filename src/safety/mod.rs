//! Safety and cleanup
//!
//! Run-scoped workspaces released on every exit path.

pub mod workspace;
