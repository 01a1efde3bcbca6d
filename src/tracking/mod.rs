//! Tracking module - accumulators, aggregate totals and tracker pipelines

mod accumulator;
mod aggregate;
mod tracker;

pub use accumulator::{Accumulator, AccumulatorMode};
pub use aggregate::AggregateView;
pub use tracker::Tracker;
