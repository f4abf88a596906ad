//! Feature derivation for conversion scoring.
//!
//! Turns raw customer records into the fixed, ordered feature vector the
//! classifier is trained on. The order of [`FEATURE_NAMES`] is the contract
//! between training, persisted artifacts and inference.

use crate::types::customer::CustomerRecord;
use ndarray::Array2;
use serde::Serialize;

/// Number of features produced per record
pub const FEATURE_COUNT: usize = 7;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "recency_days",
    "contact_frequency",
    "total_purchase_amount",
    "email_open_rate",
    "website_visits",
    "customer_age_days",
    "rfm_score",
];

/// Derived model input for one customer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    pub recency_days: f64,
    pub contact_frequency: f64,
    pub total_purchase_amount: f64,
    pub email_open_rate: f64,
    pub website_visits: f64,
    pub customer_age_days: f64,
    pub rfm_score: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.recency_days,
            self.contact_frequency,
            self.total_purchase_amount,
            self.email_open_rate,
            self.website_visits,
            self.customer_age_days,
            self.rfm_score,
        ]
    }
}

/// Stateless feature extractor.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Derive the feature vector for one record.
    ///
    /// `email_open_rate` divides by `emails_sent + 1`, so it is defined for
    /// customers who were never emailed. `rfm_score` is not clamped: recency
    /// above 100 days makes its first term negative.
    pub fn extract(&self, record: &CustomerRecord) -> FeatureVector {
        let recency_days = record.days_since_last_contact as f64;
        let contact_frequency = record.total_contacts as f64;
        let total_purchase_amount = record.total_spent;

        let email_open_rate = record.emails_opened as f64 / (record.emails_sent as f64 + 1.0);

        let rfm_score = (100.0 - recency_days) * 0.3
            + contact_frequency * 0.3
            + (total_purchase_amount / 100.0) * 0.4;

        FeatureVector {
            recency_days,
            contact_frequency,
            total_purchase_amount,
            email_open_rate,
            website_visits: record.website_visits as f64,
            customer_age_days: record.customer_age_days as f64,
            rfm_score,
        }
    }

    /// Derive feature vectors for several records, preserving order
    pub fn extract_batch(&self, records: &[CustomerRecord]) -> Vec<FeatureVector> {
        records.iter().map(|record| self.extract(record)).collect()
    }

    /// Stack feature vectors into an `(n, FEATURE_COUNT)` matrix
    pub fn to_matrix(&self, features: &[FeatureVector]) -> Array2<f64> {
        let rows: Vec<[f64; FEATURE_COUNT]> = features.iter().map(FeatureVector::to_array).collect();
        Array2::from_shape_fn((rows.len(), FEATURE_COUNT), |(i, j)| rows[i][j])
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
