//! Configuration resolution for the CLI
//!
//! Precedence, lowest first: built-in defaults, the `--config` file,
//! `INSIGHTS_*` environment variables, then command-line flags.

use crate::Cli;
use anyhow::{Context, Result};
use insights_lib::{PipelineConfig, PredictionService};
use tracing::info;

/// Build the pipeline configuration for this invocation
pub fn resolve(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration from environment".to_string(),
    })?;

    if let Some(dir) = &cli.models_dir {
        config.models_dir = dir.clone();
    }
    if let Some(version) = &cli.model_version {
        config.model_version = version.clone();
    }
    if cli.no_verify {
        config.verify_checksums = false;
    }
    Ok(config)
}

/// Flags only the batch command accepts
pub fn apply_batch_overrides(
    config: &mut PipelineConfig,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
) {
    if let Some(concurrency) = concurrency {
        config.batch_concurrency = concurrency;
    }
    if let Some(timeout) = timeout_secs {
        config.batch_timeout_secs = timeout;
    }
}

/// Load the artifacts and build the service
pub fn load_service(config: &PipelineConfig) -> Result<PredictionService> {
    info!(
        models_dir = %config.models_dir.display(),
        version = %config.model_version,
        "Loading prediction service"
    );
    PredictionService::from_config(config).with_context(|| {
        format!(
            "Failed to load model artifacts {} from {}",
            config.model_version,
            config.models_dir.display()
        )
    })
}
