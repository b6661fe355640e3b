//! Configuration management for the fraud detection service

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable prefix for overrides (`FRAUD_API_MODEL__PATH`).
pub const ENV_PREFIX: &str = "FRAUD_API";

/// Serialization format of the classifier artifact
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Pick the format from the file extension
    #[default]
    Auto,
    /// XGBoost JSON model, evaluated natively
    XgboostJson,
    /// ONNX export, evaluated through ONNX Runtime
    Onnx,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub service: ServiceInfo,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the serialized model
    pub path: PathBuf,
    /// Artifact format; `auto` decides by extension
    pub format: ModelFormat,
    /// Fraud probability above which a record is labelled 1
    pub threshold: f64,
    /// Number of threads for ONNX inference
    pub onnx_threads: usize,
    /// ONNX output holding the predicted class
    pub label_output: String,
    /// Reject artifacts whose declared feature names disagree with the contract
    pub strict_feature_names: bool,
}

impl ModelConfig {
    /// Model settings with defaults for everything but the path.
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl ModelConfig {
    /// Reject model settings no backend can run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("model.threshold must be within [0, 1], got {}", self.threshold);
        }
        if self.onnx_threads == 0 {
            bail!("model.onnx_threads must be at least 1");
        }
        if self.path.as_os_str().is_empty() {
            bail!("model.path must not be empty");
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/model.json"),
            format: ModelFormat::Auto,
            threshold: 0.5,
            onnx_threads: 1,
            label_output: "label".to_string(),
            strict_feature_names: true,
        }
    }
}

/// Static metadata returned by `GET /`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "Credit Card Fraud Detection API".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "API for detecting fraudulent credit card transactions".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file, if present, plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::build(Path::new(DEFAULT_CONFIG_PATH), false)
    }

    /// Load configuration from a specific path, which must exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()
    }
}
