//! Service and explanation configuration.
//!
//! [`ExplainConfig`] uses the `bon` builder with validation at build time;
//! [`ServiceConfig`] is read from TOML:
//!
//! ```toml
//! model_path = "artifacts/model.json"
//! scaler_path = "artifacts/scaler.json"
//! log_level = "info"
//! n_threads = 0
//!
//! [explain]
//! dominance_threshold = 0.7
//! additivity_tolerance = 1e-6
//! ```
//!
//! Relative artifact paths are resolved against the directory of the
//! configuration file.

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::explainability::{DominanceCheck, DEFAULT_DOMINANCE_THRESHOLD};

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("dominance_threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("additivity_tolerance must be positive, got {0}")]
    InvalidTolerance(f64),

    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn default_threshold() -> f64 {
    DEFAULT_DOMINANCE_THRESHOLD
}

fn default_tolerance() -> f64 {
    1e-6
}

/// Settings for explaining a single prediction.
///
/// # Example
///
/// ```
/// use shapcast::ExplainConfig;
///
/// let config = ExplainConfig::builder()
///     .dominance_threshold(0.8)
///     .build()
///     .unwrap();
/// assert_eq!(config.dominance_threshold, 0.8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(deny_unknown_fields)]
pub struct ExplainConfig {
    /// Share of total absolute attribution above which the bias warning is
    /// attached. Default: 0.7.
    #[builder(default = DEFAULT_DOMINANCE_THRESHOLD)]
    #[serde(default = "default_threshold")]
    pub dominance_threshold: f64,

    /// Relative tolerance of the `Σ contributions + base = forecast` check.
    /// Default: 1e-6.
    #[builder(default = 1e-6)]
    #[serde(default = "default_tolerance")]
    pub additivity_tolerance: f64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: DEFAULT_DOMINANCE_THRESHOLD,
            additivity_tolerance: default_tolerance(),
        }
    }
}

impl<S: explain_config_builder::IsComplete> ExplainConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `dominance_threshold` outside `(0, 1]`
    /// - `additivity_tolerance <= 0`
    pub fn build(self) -> Result<ExplainConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ExplainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.dominance_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::InvalidThreshold(t));
        }
        let tol = self.additivity_tolerance;
        if !(tol > 0.0 && tol.is_finite()) {
            return Err(ConfigError::InvalidTolerance(tol));
        }
        Ok(())
    }

    pub fn dominance_check(&self) -> DominanceCheck {
        DominanceCheck::new(self.dominance_threshold)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Top-level configuration of the forecasting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    #[serde(default)]
    pub explain: ExplainConfig,
    /// `tracing` filter directive, e.g. `info` or `shapcast=debug`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Threads for batch explanation; 0 uses the global rayon pool.
    #[serde(default)]
    pub n_threads: usize,
}

impl ServiceConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_toml_str(&text, base_dir).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse TOML text, resolving relative artifact paths against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: ServiceConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.explain.validate()?;

        if config.model_path.is_relative() {
            config.model_path = base_dir.join(&config.model_path);
        }
        if config.scaler_path.is_relative() {
            config.scaler_path = base_dir.join(&config.scaler_path);
        }
        Ok(config)
    }
}
