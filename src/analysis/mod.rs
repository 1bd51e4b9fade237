//! Lead event analysis.
//!
//! Label normalization, day/hour grouping, row materialization and the
//! aggregation entry points built on them. Nothing here performs I/O.

pub mod aggregator;
pub mod grouper;
pub mod materialize;
pub mod normalize;
pub mod tally;

pub use aggregator::*;
pub use materialize::{Cell, ReportTable};
