//! Record-level prediction: derive once, align per model, predict

use super::inference::Predictor;
use crate::artifacts::ArtifactStore;
use crate::error::Result;
use crate::features::{DerivedFeatures, FeatureAligner, FeatureEngineer};
use crate::models::{
    BatchEntry, BatchItemError, FeatureVector, ModelType, PredictionPair, PredictionResult,
    RawRecord,
};
use crate::observability::StructuredLogger;
use std::sync::Arc;

/// Shared, read-only prediction path used by single calls and batch workers
pub struct Pipeline {
    store: Arc<ArtifactStore>,
    engineer: FeatureEngineer,
    predictor: Predictor,
    logger: StructuredLogger,
}

impl Pipeline {
    pub fn new(store: Arc<ArtifactStore>, predictor: Predictor, logger: StructuredLogger) -> Self {
        Self {
            store,
            engineer: FeatureEngineer::new(),
            predictor,
            logger,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn derive(&self, record: &RawRecord) -> DerivedFeatures {
        self.engineer.derive(record)
    }

    /// Feature vector for `model_type`, in that model's schema order
    pub fn align(&self, model_type: ModelType, features: &DerivedFeatures) -> Result<FeatureVector> {
        let artifact = self.store.get(model_type)?;
        Ok(FeatureAligner::align(features, model_type, &artifact.feature_names))
    }

    /// Run one model on an already derived feature set
    pub fn predict_features(
        &self,
        model_type: ModelType,
        features: &DerivedFeatures,
    ) -> Result<PredictionResult> {
        let artifact = self.store.get(model_type)?;
        let vector = FeatureAligner::align(features, model_type, &artifact.feature_names);
        let result = self.predictor.predict(&artifact, &vector)?;
        self.logger.log_prediction(features.raw.user_id.as_ref(), &result);
        Ok(result)
    }

    pub fn predict_one(&self, model_type: ModelType, record: &RawRecord) -> Result<PredictionResult> {
        let features = self.derive(record);
        self.predict_features(model_type, &features)
    }

    /// Both models on one record, sharing a single derived feature set
    pub fn predict_all(&self, record: &RawRecord) -> Result<PredictionPair> {
        let features = self.derive(record);
        Ok(PredictionPair {
            churn: self.predict_features(ModelType::Churn, &features)?,
            ltv: self.predict_features(ModelType::Ltv, &features)?,
        })
    }

    /// Batch slot for one record; failures become an error entry
    pub(crate) fn predict_entry(&self, index: usize, record: &RawRecord) -> BatchEntry {
        match self.predict_all(record) {
            Ok(predictions) => BatchEntry::Success {
                user_id: record.user_id.clone(),
                predictions,
            },
            Err(e) => {
                let error = e.to_string();
                self.logger
                    .log_batch_item_failed(index, record.user_id.as_ref(), &error);
                BatchEntry::Failure(BatchItemError {
                    index,
                    user_id: record.user_id.clone(),
                    error,
                })
            }
        }
    }
}
