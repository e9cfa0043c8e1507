//! Analysis result processing.
//!
//! Reduces the per-agent results of a run into a report.

pub mod aggregator;
