//! Type definitions for the scoring service

pub mod customer;
pub mod score;

pub use customer::CustomerRecord;
pub use score::{BatchStatistics, ScoreResult, Segment, SegmentThresholds};
