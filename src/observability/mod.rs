//! Observability
//!
//! Counters and latency histograms for operational visibility.

pub mod metrics;
