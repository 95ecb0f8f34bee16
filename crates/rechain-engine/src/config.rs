//! Controller configuration
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::backend::CompletionOptions;
use crate::state::ModelVariant;

pub const DEFAULT_PRIMARY_MODEL: &str = "Qwen2.5-0.5B-Instruct-q0f32";
pub const DEFAULT_FALLBACK_MODEL: &str = "Qwen1.5-0.5B-Chat-q0f16";
pub const MAX_RETRIES: u32 = 3;
pub const BASE_DELAY_MS: u64 = 4_000;
pub const STABILITY_WINDOW_MS: u64 = 30_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG/read: {0}")]
    Read(#[from] std::io::Error),

    #[error("CONFIG/parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CONFIG/invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub primary_model: String,
    pub fallback_model: String,
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub base_delay_ms: u64,
    /// How long a ready engine must stay healthy before its retry count clears
    pub stability_window_ms: u64,
    pub completion: CompletionOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            max_retries: MAX_RETRIES,
            base_delay_ms: BASE_DELAY_MS,
            stability_window_ms: STABILITY_WINDOW_MS,
            completion: CompletionOptions::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_model.trim().is_empty() || self.fallback_model.trim().is_empty() {
            return Err(ConfigError::Invalid("model ids must not be empty".to_string()));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Invalid("base_delay_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Primary => &self.primary_model,
            ModelVariant::Fallback => &self.fallback_model,
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// `base_delay * 2^retry_count`
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base_delay()
            .saturating_mul(2u32.saturating_pow(retry_count))
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let config = EngineConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(4));
        assert_eq!(config.backoff(1), Duration::from_secs(8));
        assert_eq!(config.backoff(2), Duration::from_secs(16));
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let config = EngineConfig::from_yaml_str(
            "primary_model: big\nbase_delay_ms: 10\ncompletion:\n  max_tokens: 64\n",
        )
        .unwrap();
        assert_eq!(config.primary_model, "big");
        assert_eq!(config.fallback_model, DEFAULT_FALLBACK_MODEL);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.completion.max_tokens, 64);
        assert_eq!(config.completion.temperature, 0.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(EngineConfig::from_yaml_str("base_delay_ms: 0").is_err());
        assert!(EngineConfig::from_yaml_str("fallback_model: ''").is_err());
    }
}
