//! Result types and the aggregator that merges them
//!
//! This module defines the result structures shared by plugins, the ranking
//! engine and the UI projection.

mod aggregator;
mod types;

pub use aggregator::ResultAggregator;
pub use types::*;
