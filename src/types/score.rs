//! Score and segment data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contact-priority tier derived from the conversion score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    Hot,
    Warm,
    Cold,
}

impl Segment {
    /// All segments, highest priority first
    pub const ALL: [Segment; 3] = [Segment::Hot, Segment::Warm, Segment::Cold];

    /// Determine the segment for a score. Ties resolve upwards.
    pub fn from_score(score: u8, thresholds: &SegmentThresholds) -> Self {
        if score >= thresholds.hot {
            Segment::Hot
        } else if score >= thresholds.warm {
            Segment::Warm
        } else {
            Segment::Cold
        }
    }

    /// Follow-up action suggested for this segment
    pub fn recommendation(&self) -> &'static str {
        match self {
            Segment::Hot => "high priority, contact immediately",
            Segment::Warm => "medium priority, follow up within 48h",
            Segment::Cold => "low priority, automated nurture",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Hot => "Hot",
            Segment::Warm => "Warm",
            Segment::Cold => "Cold",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower score bounds (inclusive) of the Hot and Warm segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentThresholds {
    pub hot: u8,
    pub warm: u8,
}

impl SegmentThresholds {
    /// Human-readable score range of each segment
    pub fn describe(&self) -> [(Segment, String); 3] {
        [
            (Segment::Hot, format!("Score >= {}", self.hot)),
            (
                Segment::Warm,
                format!("{} <= Score < {}", self.warm, self.hot),
            ),
            (Segment::Cold, format!("Score < {}", self.warm)),
        ]
    }
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self { hot: 70, warm: 40 }
    }
}

/// Scoring outcome for a single customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub customer_id: i64,
    /// Conversion score, 0-100 inclusive
    pub score: u8,
    pub segment: Segment,
}

/// Aggregate figures over a scored batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total_clients: usize,
    pub hot_leads: usize,
    pub warm_leads: usize,
    pub cold_leads: usize,
    pub average_score: f64,
}

impl BatchStatistics {
    pub fn from_results(results: &[ScoreResult]) -> Self {
        let count = |segment: Segment| results.iter().filter(|r| r.segment == segment).count();
        let total: u64 = results.iter().map(|r| u64::from(r.score)).sum();

        let average_score = if results.is_empty() {
            0.0
        } else {
            total as f64 / results.len() as f64
        };

        Self {
            total_clients: results.len(),
            hot_leads: count(Segment::Hot),
            warm_leads: count(Segment::Warm),
            cold_leads: count(Segment::Cold),
            average_score,
        }
    }
}
