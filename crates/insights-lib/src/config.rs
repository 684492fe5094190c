//! Pipeline configuration

use crate::predictor::{BatchConfig, OutputConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix, e.g. `INSIGHTS_MODEL_VERSION`
pub const ENV_PREFIX: &str = "INSIGHTS";

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the versioned artifact files
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Artifact version to load
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Maximum records predicted at once in a batch
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Wall-time bound for a whole batch; 0 disables it
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    /// Length of the feature importance list
    #[serde(default = "default_top_features")]
    pub top_features: usize,

    /// Check artifacts against `manifest_{version}.json` when present
    #[serde(default = "default_verify_checksums")]
    pub verify_checksums: bool,

    /// Instance name attached to structured log events
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_model_version() -> String {
    "v1.0.0".to_string()
}

fn default_batch_concurrency() -> usize {
    8
}

fn default_batch_timeout() -> u64 {
    30
}

fn default_top_features() -> usize {
    10
}

fn default_verify_checksums() -> bool {
    true
}

fn default_service_name() -> String {
    "insights".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            model_version: default_model_version(),
            batch_concurrency: default_batch_concurrency(),
            batch_timeout_secs: default_batch_timeout(),
            top_features: default_top_features(),
            verify_checksums: default_verify_checksums(),
            service_name: default_service_name(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from an optional file, then `INSIGHTS_*`
    /// environment variables. Unset keys keep their defaults.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            concurrency: self.batch_concurrency.max(1),
            timeout: (self.batch_timeout_secs > 0)
                .then(|| Duration::from_secs(self.batch_timeout_secs)),
        }
    }

    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            top_features: self.top_features,
            ..OutputConfig::default()
        }
    }
}
