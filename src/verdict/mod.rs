//! Verdict classification
//!
//! Derives run statuses as pure functions over structured run evidence.

pub mod verdict;
