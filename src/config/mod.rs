use std::env;

use crate::valuation::adjustment::AdjustmentConfig;
use crate::valuation::retrieval::RetrievalConfig;
use crate::valuation::scoring::ScoringConfig;

/// Top-level configuration bundle for the valuation engine.
///
/// Defaults match the documented model constants; a handful of deployment
/// knobs can be overridden through the environment.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub scoring: ScoringConfig,
    pub adjustment: AdjustmentConfig,
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Loads defaults, then applies environment overrides:
    /// `VALUATION_LOG_LEVEL`, `VALUATION_MAX_SALE_AGE_DAYS`,
    /// `VALUATION_OVERSAMPLE_FACTOR`, `VALUATION_TIME_SHRINK`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(level) = env::var("VALUATION_LOG_LEVEL") {
            config.telemetry.log_level = level;
        }
        if let Some(days) = parse_env("VALUATION_MAX_SALE_AGE_DAYS")? {
            config.retrieval.max_sale_age_days = days;
        }
        if let Some(factor) = parse_env("VALUATION_OVERSAMPLE_FACTOR")? {
            config.retrieval.oversample_factor = factor;
        }
        if let Some(shrink) = parse_env::<f64>("VALUATION_TIME_SHRINK")? {
            if !(0.0..=1.0).contains(&shrink) {
                return Err(ConfigError::OutOfRange {
                    key: "VALUATION_TIME_SHRINK",
                    value: shrink.to_string(),
                });
            }
            config.adjustment.time_shrink = shrink;
        }

        Ok(config)
    }
}

/// Logging controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must parse as {expected}: got '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{key} out of range: {value}")]
    OutOfRange { key: &'static str, value: String },
}

fn parse_env<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key,
                expected: std::any::type_name::<T>(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
