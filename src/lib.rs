//! CRM Conversion Scoring Library
//!
//! Scores CRM prospects by conversion likelihood (0-100) with a random
//! forest over derived behavioral features, and sorts them into Hot, Warm
//! and Cold segments for follow-up.

pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod scorer;
pub mod server;
pub mod service;
pub mod telemetry;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use error::{ErrorKind, Result, ScoringError};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::classifier::ConversionClassifier;
pub use scorer::Scorer;
pub use service::ScoringService;
pub use types::{CustomerRecord, ScoreResult, Segment};
