//! Observability for the prediction pipeline
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes by label, batch sizes, loaded models)
//! - Structured JSON logging with tracing

use crate::models::{BatchResult, ModelType, ModelsDescription, PredictionResult, UserId};
use prometheus::{
    register_gauge_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Encoder, GaugeVec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-record inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Histogram buckets for batch sizes (records)
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    batch_size: Histogram,
    batch_item_failures_total: IntCounter,
    model_info: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "insights_prediction_latency_seconds",
                "Time spent scaling and running one model on one record",
                &["model_type"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "insights_predictions_total",
                "Predictions generated, by model type and category",
                &["model_type", "label"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "insights_prediction_errors_total",
                "Predictions that failed, by model type",
                &["model_type"]
            )
            .expect("Failed to register prediction_errors_total"),

            batch_size: register_histogram!(
                "insights_batch_size",
                "Number of records per batch request",
                BATCH_SIZE_BUCKETS.to_vec()
            )
            .expect("Failed to register batch_size"),

            batch_item_failures_total: register_int_counter!(
                "insights_batch_item_failures_total",
                "Batch records that produced an error entry"
            )
            .expect("Failed to register batch_item_failures_total"),

            model_info: register_gauge_vec!(
                "insights_model_info",
                "Information about the loaded model artifacts",
                &["model_type", "version", "features"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_prediction(&self, model_type: ModelType, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[model_type.as_str()])
            .observe(duration_secs);
    }

    pub fn record_prediction(&self, model_type: ModelType, label: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[model_type.as_str(), label])
            .inc();
    }

    pub fn record_error(&self, model_type: ModelType) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[model_type.as_str()])
            .inc();
    }

    pub fn observe_batch(&self, size: usize, failed: usize) {
        self.inner().batch_size.observe(size as f64);
        self.inner().batch_item_failures_total.inc_by(failed as u64);
    }

    /// Replace the model info series with the loaded artifact set
    pub fn set_models(&self, description: &ModelsDescription) {
        let gauge = &self.inner().model_info;
        gauge.reset();
        for (model_type, features) in &description.feature_counts {
            gauge
                .with_label_values(&[
                    model_type.as_str(),
                    description.version.as_str(),
                    features.to_string().as_str(),
                ])
                .set(1.0);
        }
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for pipeline events
///
/// Every event carries an `event` field and the `service` instance name.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn log_artifacts_loaded(&self, description: &ModelsDescription, models_dir: &str) {
        info!(
            event = "artifacts_loaded",
            service = %self.service,
            version = %description.version,
            models_dir = %models_dir,
            churn_features = description.feature_counts.get(&ModelType::Churn).copied().unwrap_or(0),
            ltv_features = description.feature_counts.get(&ModelType::Ltv).copied().unwrap_or(0),
            "Model artifacts loaded"
        );
    }

    pub fn log_prediction(&self, user_id: Option<&UserId>, result: &PredictionResult) {
        info!(
            event = "prediction_generated",
            service = %self.service,
            user_id = ?user_id.map(|id| id.to_string()),
            model_type = %result.model_type,
            label = %result.output.label(),
            score = result.output.score(),
            model_version = %result.model_version,
            "Generated prediction"
        );
    }

    pub fn log_batch_item_failed(&self, index: usize, user_id: Option<&UserId>, error: &str) {
        warn!(
            event = "batch_item_failed",
            service = %self.service,
            index = index,
            user_id = ?user_id.map(|id| id.to_string()),
            error = %error,
            "Batch record failed"
        );
    }

    pub fn log_batch_completed(&self, result: &BatchResult, duration_ms: u128) {
        info!(
            event = "batch_completed",
            service = %self.service,
            records = result.len(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            duration_ms = duration_ms as u64,
            "Batch completed"
        );
    }
}
