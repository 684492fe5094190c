//! Runner Insights CLI
//!
//! Runs the churn and lifetime value models against runner activity
//! records stored as JSON.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{batch, describe, features, predict};
use insights_lib::{ModelType, PipelineMetrics};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Runner Insights CLI
#[derive(Parser)]
#[command(name = "insights")]
#[command(author, version, about = "Churn and lifetime value predictions for Runner Insights", long_about = None)]
pub struct Cli {
    /// Directory containing the model artifacts
    #[arg(long, env = "MODELS_PATH", global = true)]
    pub models_dir: Option<PathBuf>,

    /// Artifact version to load, e.g. v1.0.0
    #[arg(long, env = "MODEL_VERSION", global = true)]
    pub model_version: Option<String>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Skip artifact checksum verification
    #[arg(long, global = true)]
    pub no_verify: bool,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict churn and/or lifetime value for one record
    Predict {
        /// Which model to run
        #[arg(long, short, default_value = "all")]
        model: ModelSelection,

        /// JSON file holding one record object ("-" for stdin)
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Predict both models for every record in a JSON array
    Batch {
        /// JSON file holding an array of records ("-" for stdin)
        #[arg(long, short)]
        input: PathBuf,

        /// Maximum records predicted at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Batch timeout in seconds (0 disables it)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Show the loaded model version and feature counts
    Describe,

    /// Show the engineered features for one record
    Features {
        /// JSON file holding one record object ("-" for stdin)
        #[arg(long, short)]
        input: PathBuf,

        /// Show the aligned input vector for this model instead
        #[arg(long, short)]
        model: Option<ModelType>,
    },
}

/// Model choice for the predict command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelSelection {
    Churn,
    Ltv,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut pipeline_config = config::resolve(&cli)?;

    match &cli.command {
        Commands::Predict { model, input } => {
            let service = config::load_service(&pipeline_config)?;
            predict::run(&service, *model, input, cli.format)?;
        }
        Commands::Batch {
            input,
            concurrency,
            timeout_secs,
        } => {
            config::apply_batch_overrides(&mut pipeline_config, *concurrency, *timeout_secs);
            let service = config::load_service(&pipeline_config)?;
            batch::run(&service, input, cli.format).await?;
        }
        Commands::Describe => {
            let service = config::load_service(&pipeline_config)?;
            describe::run(&service, &pipeline_config, cli.format)?;
        }
        Commands::Features { input, model } => {
            let service = config::load_service(&pipeline_config)?;
            features::run(&service, input, *model, cli.format)?;
        }
    }

    if cli.metrics {
        eprint!("{}", PipelineMetrics::new().gather());
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays machine-readable
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
