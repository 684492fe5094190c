//! Prediction engine

mod batch;
mod inference;
mod output;
mod pipeline;

pub use batch::{BatchConfig, BatchCoordinator, DEFAULT_BATCH_CONCURRENCY, DEFAULT_BATCH_TIMEOUT};
pub use inference::{InferenceStats, Predictor};
pub use output::{
    LtvCategory, OutputConfig, OutputFormatter, RiskLevel, DEFAULT_TOP_FEATURES,
    HIGH_LTV_THRESHOLD, HIGH_RISK_THRESHOLD, MEDIUM_LTV_THRESHOLD, MEDIUM_RISK_THRESHOLD,
};
pub use pipeline::Pipeline;
