//! Engine configuration
//!
//! Handles loading configuration from embedded defaults, files, and
//! environment. Section structs carry serde defaults so partial override
//! files stay valid.

use crate::error::{Error, Result};
use crate::guardian::GuardianConfig;
use anyhow::Context;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into the crate)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Workflow orchestration settings
    #[serde(default)]
    pub workflow: WorkflowSettings,
    /// Scout pre-analysis settings
    #[serde(default)]
    pub scout: ScoutSettings,
    /// Guardian continuous-validation settings
    #[serde(default)]
    pub guardian: GuardianConfig,
    /// Resilience layer settings
    #[serde(default)]
    pub resilience: ResilienceSettings,
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workflow.max_parallel == 0 {
            return Err(Error::InvalidConfig {
                field: "workflow.max_parallel".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.scout.cache_capacity == 0 {
            return Err(Error::InvalidConfig {
                field: "scout.cache_capacity".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.guardian.batch_size == 0 {
            return Err(Error::InvalidConfig {
                field: "guardian.batch_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.guardian.validation_interval_secs == 0 {
            return Err(Error::InvalidConfig {
                field: "guardian.validation_interval_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.resilience.failure_threshold == 0 {
            return Err(Error::InvalidConfig {
                field: "resilience.failure_threshold".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Workflow orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Maximum tasks dispatched concurrently from one ready set
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Seconds to wait on a confirmation gate before treating it as denied
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

fn default_max_parallel() -> usize {
    4
}
fn default_confirmation_timeout() -> u64 {
    300
}

/// Scout pre-analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutSettings {
    /// Seconds a cached report stays fresh
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    /// Maximum number of cached reports
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Seconds between background sweeps of expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ScoutSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    1800
}
fn default_cache_capacity() -> usize {
    1000
}
fn default_sweep_interval() -> u64 {
    300
}

/// Resilience layer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Retry budget for network failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Consecutive failures before a breaker opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an open breaker rejects calls before allowing a probe
    #[serde(default = "default_breaker_timeout")]
    pub breaker_timeout_secs: u64,
    /// Whether exhausted recovery falls back to the offline mock response
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            failure_threshold: default_failure_threshold(),
            breaker_timeout_secs: default_breaker_timeout(),
            fallback_enabled: true,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_breaker_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Load configuration from embedded defaults, files, and environment
pub fn load_config() -> anyhow::Result<EngineConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/strategos").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("STRATEGOS_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") ensures STRATEGOS_GUARDIAN__X works (single _
        // after prefix); the default would require STRATEGOS__GUARDIAN__X.
        .add_source(
            Environment::with_prefix("STRATEGOS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: EngineConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_struct_defaults() {
        let from_toml: EngineConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(from_toml, EngineConfig::default());
    }

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = EngineConfig::default();
        config.guardian.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("guardian.batch_size"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_max_parallel_rejected() {
        let mut config = EngineConfig::default();
        config.workflow.max_parallel = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let partial = r#"
            [workflow]
            max_parallel = 8
        "#;
        let config: EngineConfig = Config::builder()
            .add_source(File::from_str(partial, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.workflow.max_parallel, 8);
        assert_eq!(config.scout.cache_capacity, 1000);
        assert_eq!(config.resilience.failure_threshold, 5);
    }
}
