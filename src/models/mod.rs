//! Conversion classifier and the random forest behind it

pub mod classifier;
pub mod forest;
pub mod loader;
pub mod tree;

pub use classifier::{ConversionClassifier, ModelState, TrainedModel};
pub use forest::{ForestParams, RandomForest};
pub use loader::{ModelArtifact, ModelMetadata};
