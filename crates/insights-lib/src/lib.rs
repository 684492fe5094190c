//! Churn and lifetime value prediction for runner activity data
//!
//! This crate provides:
//! - Feature engineering and alignment to each model's training schema
//! - Versioned model artifacts (scaler, estimator, feature list)
//! - Single-record and batch prediction with feature importances
//! - Configuration and observability

pub mod artifacts;
pub mod config;
pub mod error;
pub mod features;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use service::PredictionService;
