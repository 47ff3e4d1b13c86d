use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid concurrency: {0}. Must be between 1 and 256")]
    InvalidConcurrency(usize),

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(usize),

    #[error("Invalid poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Invalid baseline_precision: {0}. Must be at least 1")]
    InvalidBaselinePrecision(u32),

    #[error("Invalid {name}: {value}. Must be a positive decimal")]
    InvalidDecimal { name: &'static str, value: String },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .babysitter/config.yaml (project config)
    /// 3. .babysitter/local.yaml (local overrides, optional)
    /// 4. Environment variables (BABYSITTER_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::base()
            .merge(Yaml::file(".babysitter/config.yaml"))
            .merge(Yaml::file(".babysitter/local.yaml"))
            .merge(Self::env())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment variables still
    /// take precedence over it.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Self::base()
            .merge(Yaml::file(path))
            .merge(Self::env())
            .extract()
            .context(format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn base() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    fn env() -> Env {
        Env::prefixed("BABYSITTER_").split("__")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let driver = &config.driver;
        if driver.concurrency == 0 || driver.concurrency > 256 {
            return Err(ConfigError::InvalidConcurrency(driver.concurrency));
        }
        if driver.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(driver.max_iterations));
        }
        if driver.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(driver.poll_interval_ms));
        }

        let analyzer = &config.analyzer;
        if analyzer.baseline_precision == 0 {
            return Err(ConfigError::InvalidBaselinePrecision(
                analyzer.baseline_precision,
            ));
        }
        positive_decimal("matrix_scale_divisor", &analyzer.matrix_scale_divisor)?;
        positive_decimal("default_matrix_scale", &analyzer.default_matrix_scale)?;

        let executables = &config.backend.executables;
        if executables.solver.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "solver executable cannot be empty".to_string(),
            ));
        }
        if executables.aux_creator.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "aux_creator executable cannot be empty".to_string(),
            ));
        }

        let logging = &config.logging;
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !["json", "pretty"].contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(logging.rotation.clone()));
        }

        Ok(())
    }
}

fn positive_decimal(name: &'static str, value: &str) -> Result<(), ConfigError> {
    match BigDecimal::from_str(value.trim()) {
        Ok(parsed) if parsed > BigDecimal::from(0) => Ok(()),
        _ => Err(ConfigError::InvalidDecimal {
            name,
            value: value.to_string(),
        }),
    }
}
