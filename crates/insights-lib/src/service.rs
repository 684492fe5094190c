//! Boundary operations of the prediction pipeline
//!
//! A [`PredictionService`] can only be built from a fully loaded
//! [`ArtifactStore`], so every call it serves has both models available.

use crate::artifacts::ArtifactStore;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::DerivedFeatures;
use crate::models::{
    BatchResult, FeatureVector, ModelType, ModelsDescription, PredictionPair, PredictionResult, RawRecord,
};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::predictor::{BatchCoordinator, InferenceStats, Pipeline, Predictor};
use std::sync::Arc;

#[derive(Clone)]
pub struct PredictionService {
    pipeline: Arc<Pipeline>,
    batch: BatchCoordinator,
}

impl PredictionService {
    /// Load the configured artifact version and build the service.
    ///
    /// Any missing or invalid artifact is returned as a fatal error.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let store = ArtifactStore::load_all(
            &config.models_dir,
            &config.model_version,
            config.verify_checksums,
        )?;
        let service = Self::new(store, config);
        service
            .pipeline
            .logger()
            .log_artifacts_loaded(&service.describe_models(), &config.models_dir.display().to_string());
        Ok(service)
    }

    pub fn new(store: ArtifactStore, config: &PipelineConfig) -> Self {
        let logger = StructuredLogger::new(config.service_name.clone());
        let predictor = Predictor::with_config(config.output_config());
        let pipeline = Arc::new(Pipeline::new(Arc::new(store), predictor, logger));

        PipelineMetrics::new().set_models(&pipeline.store().describe());

        Self {
            batch: BatchCoordinator::new(Arc::clone(&pipeline), config.batch_config()),
            pipeline,
        }
    }

    pub fn predict_one(&self, model_type: ModelType, record: &RawRecord) -> Result<PredictionResult> {
        self.pipeline.predict_one(model_type, record)
    }

    pub fn predict_all(&self, record: &RawRecord) -> Result<PredictionPair> {
        self.pipeline.predict_all(record)
    }

    pub async fn predict_batch(&self, records: Vec<RawRecord>) -> Result<BatchResult> {
        self.batch.run_batch(records).await
    }

    /// Batch intake straight from JSON, one record per element
    pub async fn predict_batch_json(&self, values: Vec<serde_json::Value>) -> Result<BatchResult> {
        self.batch.run_batch_json(values).await
    }

    pub fn describe_models(&self) -> ModelsDescription {
        self.pipeline.store().describe()
    }

    /// The engineered feature set the models would see for `record`
    pub fn derive_features(&self, record: &RawRecord) -> DerivedFeatures {
        self.pipeline.derive(record)
    }

    /// Input vector `model_type` would receive for `record`
    pub fn align_features(&self, model_type: ModelType, record: &RawRecord) -> Result<FeatureVector> {
        let features = self.pipeline.derive(record);
        self.pipeline.align(model_type, &features)
    }

    /// Training column names of `model_type`, in schema order
    pub fn feature_names(&self, model_type: ModelType) -> Result<Vec<String>> {
        Ok(self.pipeline.store().get(model_type)?.feature_names.clone())
    }

    pub fn stats(&self) -> InferenceStats {
        self.pipeline.predictor().stats()
    }
}
