//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Crates whose events are enabled at the configured level
const LOG_TARGETS: [&str; 4] = ["crm_scoring", "crm_scoring_service", "train_model", "tower_http"];

/// Install the global subscriber. A `RUST_LOG` value takes over filtering
/// entirely; otherwise the configured level applies to this crate's targets.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(config, env_directives.as_deref())?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }

    Ok(())
}

fn build_filter(config: &LoggingConfig, env_directives: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = env_directives.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid {} value '{}'", EnvFilter::DEFAULT_ENV, directives));
    }

    let mut filter = EnvFilter::default();
    for target in LOG_TARGETS {
        let directive = format!("{}={}", target, config.level);
        filter = filter.add_directive(
            directive
                .parse::<Directive>()
                .with_context(|| format!("Invalid log level '{}'", config.level))?,
        );
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_configured_level_applies_without_env() {
        let filter = build_filter(&logging("warn"), None).unwrap().to_string();
        assert!(filter.contains("crm_scoring=warn"));
        assert!(filter.contains("tower_http=warn"));
    }

    #[test]
    fn test_env_directives_win_over_config() {
        let filter = build_filter(&logging("info"), Some("crm_scoring=debug"))
            .unwrap()
            .to_string();
        assert!(filter.contains("crm_scoring=debug"));
        assert!(!filter.contains("crm_scoring=info"));
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(build_filter(&logging("loud"), None).is_err());
    }
}
