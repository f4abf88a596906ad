//! Configuration management for the scoring service

use crate::models::forest::ForestParams;
use crate::types::score::SegmentThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `CRM_SCORING__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "CRM_SCORING";

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub segmentation: SegmentThresholds,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty or `*` allows any origin
    pub cors_origins: Vec<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            request_timeout_secs: 30,
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Where the trained model artifact lives
    pub artifact_path: PathBuf,
    /// Load the artifact at startup when it exists
    pub autoload: bool,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            artifact_path: PathBuf::from("models/lead_scoring_model.json"),
            autoload: true,
            n_estimators: forest.n_estimators,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            seed: forest.seed,
        }
    }
}

/// Training harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Synthetic samples to generate when no dataset is given
    pub samples: usize,
    /// Fraction of the dataset held out for evaluation
    pub test_ratio: f64,
    /// Seed for synthetic data and the train/test split
    pub seed: u64,
    /// Score at or above which a customer is predicted to convert
    pub decision_threshold: u8,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            test_ratio: 0.2,
            seed: 42,
            decision_threshold: 50,
        }
    }
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between logged summaries, 0 disables periodic reports
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, then apply environment overrides.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layered(path.as_ref(), Self::environment())
    }

    /// `CRM_SCORING__SECTION__KEY` overrides, values parsed as numbers or bools where possible
    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn load_layered(path: &Path, environment: Environment) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let thresholds = &self.segmentation;
        ensure!(
            thresholds.warm < thresholds.hot && thresholds.hot <= 100,
            "segmentation thresholds must satisfy warm < hot <= 100 (got warm={}, hot={})",
            thresholds.warm,
            thresholds.hot
        );
        ensure!(
            self.training.test_ratio > 0.0 && self.training.test_ratio < 1.0,
            "training.test_ratio must be in (0, 1), got {}",
            self.training.test_ratio
        );
        ensure!(
            self.training.decision_threshold <= 100,
            "training.decision_threshold must be at most 100, got {}",
            self.training.decision_threshold
        );
        ensure!(self.model.n_estimators > 0, "model.n_estimators must be positive");
        ensure!(self.model.max_depth > 0, "model.max_depth must be positive");
        ensure!(self.server.request_timeout_secs > 0, "server.request_timeout_secs must be positive");
        Ok(())
    }

    /// Forest hyper-parameters from the `model` section
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.model.n_estimators,
            max_depth: self.model.max_depth,
            min_samples_split: self.model.min_samples_split,
            seed: self.model.seed,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.segmentation, SegmentThresholds { hot: 70, warm: 40 });
        assert_eq!(config.training.decision_threshold, 50);
        assert_eq!(config.forest_params(), ForestParams::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.segmentation = SegmentThresholds { hot: 40, warm: 70 };
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.training.test_ratio = 1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.n_estimators = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.model.n_estimators, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nport = 8088\n\n[model]\nn_estimators = 25").unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.n_estimators, 25);
        assert_eq!(config.model.max_depth, 10);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[segmentation]\nhot = 30\nwarm = 60\n").unwrap();

        assert!(AppConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8088\n").unwrap();

        let vars: config::Map<String, String> = [
            ("CRM_SCORING__SERVER__PORT", "9123"),
            ("CRM_SCORING__SEGMENTATION__HOT", "80"),
            ("UNRELATED__SERVER__PORT", "1"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let config =
            AppConfig::load_layered(&path, AppConfig::environment().source(Some(vars))).unwrap();
        assert_eq!(config.server.port, 9123);
        assert_eq!(config.segmentation.hot, 80);
        assert_eq!(config.segmentation.warm, 40);
    }
}
