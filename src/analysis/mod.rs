//! History analysis.
//!
//! Currently a single pass: grouping lifecycle events into aggregated records.

pub mod aggregator;

pub use aggregator::*;
