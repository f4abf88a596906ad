//! Probability to score conversion and segmentation policy

use crate::types::score::{ScoreResult, Segment, SegmentThresholds};

/// Turns classifier probabilities into integer scores and segments
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    thresholds: SegmentThresholds,
}

impl Scorer {
    pub fn new(thresholds: SegmentThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &SegmentThresholds {
        &self.thresholds
    }

    /// `floor(probability * 100)`, kept within 0..=100
    pub fn score_from_probability(&self, probability: f64) -> u8 {
        if !probability.is_finite() {
            return 0;
        }
        (probability * 100.0).floor().clamp(0.0, 100.0) as u8
    }

    pub fn segment(&self, score: u8) -> Segment {
        Segment::from_score(score, &self.thresholds)
    }

    pub fn score(&self, customer_id: i64, probability: f64) -> ScoreResult {
        let score = self.score_from_probability(probability);
        ScoreResult {
            customer_id,
            score,
            segment: self.segment(score),
        }
    }
}
