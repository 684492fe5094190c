//! Model invocation for a single aligned feature vector

use super::output::{OutputConfig, OutputFormatter};
use crate::artifacts::{Estimator, ModelArtifact};
use crate::error::{PipelineError, Result};
use crate::models::{FeatureVector, ModelType, PredictionResult};
use crate::observability::PipelineMetrics;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 10;

/// Runs one artifact on one feature vector.
///
/// Stateless apart from counters, so a single instance is shared by every
/// batch worker.
pub struct Predictor {
    formatter: OutputFormatter,
    metrics: PipelineMetrics,
    inference_count: AtomicU64,
    failure_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl Predictor {
    pub fn new() -> Self {
        Self::with_config(OutputConfig::default())
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self {
            formatter: OutputFormatter::with_config(config),
            metrics: PipelineMetrics::new(),
            inference_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    /// Predict with the current time as `predicted_at`
    pub fn predict(&self, artifact: &ModelArtifact, vector: &FeatureVector) -> Result<PredictionResult> {
        self.predict_at(artifact, vector, Utc::now())
    }

    /// Predict with a caller-supplied timestamp. Identical inputs give
    /// identical results.
    pub fn predict_at(
        &self,
        artifact: &ModelArtifact,
        vector: &FeatureVector,
        predicted_at: DateTime<Utc>,
    ) -> Result<PredictionResult> {
        let start = Instant::now();
        let result = self.run(artifact, vector, predicted_at);
        let elapsed = start.elapsed();

        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .observe_prediction(artifact.model_type, elapsed.as_secs_f64());

        match &result {
            Ok(prediction) => {
                self.metrics
                    .record_prediction(artifact.model_type, prediction.output.label());
                if elapsed.as_millis() > MAX_INFERENCE_MS {
                    self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        model_type = %artifact.model_type,
                        elapsed_ms = elapsed.as_millis(),
                        "Inference exceeded {}ms target",
                        MAX_INFERENCE_MS
                    );
                } else {
                    debug!(
                        model_type = %artifact.model_type,
                        elapsed_us = elapsed.as_micros(),
                        "Inference completed"
                    );
                }
            }
            Err(e) => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_error(artifact.model_type);
                debug!(model_type = %artifact.model_type, error = %e, "Inference failed");
            }
        }
        result
    }

    fn run(
        &self,
        artifact: &ModelArtifact,
        vector: &FeatureVector,
        predicted_at: DateTime<Utc>,
    ) -> Result<PredictionResult> {
        let model_type = artifact.model_type;
        if vector.model_type != model_type {
            return Err(PipelineError::SchemaMismatch {
                model_type,
                reason: format!("vector was aligned for the {} model", vector.model_type),
            });
        }
        if vector.len() != artifact.n_features() {
            return Err(PipelineError::SchemaMismatch {
                model_type,
                reason: format!(
                    "vector has {} values but the schema has {}",
                    vector.len(),
                    artifact.n_features()
                ),
            });
        }

        let scaled = artifact
            .scaler
            .transform(vector.as_slice())
            .map_err(|e| PipelineError::inference(model_type, e))?;

        let output = match (&artifact.estimator, model_type) {
            (Estimator::Classifier(model), ModelType::Churn) => {
                let probabilities = model
                    .predict_proba(&scaled)
                    .map_err(|e| PipelineError::inference(model_type, e))?;
                let label = model
                    .predict(&scaled)
                    .map_err(|e| PipelineError::inference(model_type, e))?;
                self.formatter.format_churn(label, probabilities)
            }
            (Estimator::Regressor(model), ModelType::Ltv) => {
                let value = model
                    .predict(&scaled)
                    .map_err(|e| PipelineError::inference(model_type, e))?;
                self.formatter.format_ltv(value)
            }
            (estimator, _) => {
                return Err(PipelineError::inference(
                    model_type,
                    format!("artifact holds a {}", estimator.kind()),
                ))
            }
        };

        let feature_importance = artifact
            .estimator
            .explainable()
            .map(|model| {
                self.formatter.rank_importances(
                    &artifact.feature_names,
                    vector.as_slice(),
                    model.feature_importances(),
                )
            })
            .unwrap_or_default();

        Ok(PredictionResult {
            model_type,
            output,
            feature_importance,
            model_version: artifact.version.clone(),
            predicted_at,
        })
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            failed_inferences: self.failure_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new()
    }
}

/// Inference statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub failed_inferences: u64,
    pub slow_inferences: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{EstimatorSpec, NativeEstimator, StandardScaler};
    use crate::features::{FeatureAligner, FeatureEngineer};
    use crate::models::{PredictionOutput, RawRecord};
    use crate::predictor::{LtvCategory, RiskLevel};
    use crate::testing::{churn_artifact, ltv_artifact, sample_record};

    fn aligned(artifact: &ModelArtifact, record: &RawRecord) -> FeatureVector {
        let features = FeatureEngineer::new().derive(record);
        FeatureAligner::align(&features, artifact.model_type, &artifact.feature_names)
    }

    fn linear_ltv(intercept: f64) -> ModelArtifact {
        let names = vec!["runs_last_30_days".to_string(), "engagement_score".to_string()];
        let spec = EstimatorSpec::Linear {
            coefficients: vec![0.0, 0.0],
            intercept,
        };
        let estimator = Estimator::Regressor(Box::new(NativeEstimator::new(spec, 2).unwrap()));
        let scaler = StandardScaler {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        };
        ModelArtifact::new(ModelType::Ltv, "v1.0.0", estimator, scaler, names, "linear").unwrap()
    }

    #[test]
    fn test_churn_prediction() {
        let artifact = churn_artifact();
        let vector = aligned(&artifact, &sample_record());
        let result = Predictor::new().predict(&artifact, &vector).unwrap();

        assert_eq!(result.model_type, ModelType::Churn);
        assert_eq!(result.model_version, "v1.0.0");
        match result.output {
            PredictionOutput::Churn {
                prediction,
                probability,
                risk_level,
                confidence_score,
            } => {
                assert!((0.0..=1.0).contains(&probability));
                assert!((0.5..=1.0).contains(&confidence_score));
                assert_eq!(risk_level, RiskLevel::from_probability(probability));
                assert_eq!(prediction, u8::from(probability > 0.5));
            }
            other => panic!("unexpected output: {:?}", other),
        }

        assert!(!result.feature_importance.is_empty());
        assert!(result.feature_importance.len() <= 10);
        assert_eq!(result.feature_importance[0].rank, 1);
    }

    #[test]
    fn test_ltv_prediction_is_non_negative() {
        let artifact = ltv_artifact();
        let vector = aligned(&artifact, &sample_record());
        let result = Predictor::new().predict(&artifact, &vector).unwrap();
        assert!(result.output.score() >= 0.0);
        assert_eq!(result.feature_importance.len(), 10);

        let negative = linear_ltv(-120.0);
        let vector = aligned(&negative, &RawRecord::default());
        let result = Predictor::new().predict(&negative, &vector).unwrap();
        assert_eq!(
            result.output,
            PredictionOutput::Ltv {
                ltv_value: 0.0,
                ltv_category: LtvCategory::Zero
            }
        );
        // Linear models carry no importances
        assert!(result.feature_importance.is_empty());
    }

    #[test]
    fn test_ltv_category_boundaries_through_model() {
        let predictor = Predictor::new();
        for (intercept, expected) in [
            (500.0, LtvCategory::High),
            (200.0, LtvCategory::Medium),
            (0.01, LtvCategory::Low),
            (0.0, LtvCategory::Zero),
        ] {
            let artifact = linear_ltv(intercept);
            let vector = aligned(&artifact, &RawRecord::default());
            let result = predictor.predict(&artifact, &vector).unwrap();
            assert_eq!(result.output.label(), expected.as_str(), "intercept {}", intercept);
        }
    }

    #[test]
    fn test_deterministic() {
        let artifact = churn_artifact();
        let vector = aligned(&artifact, &sample_record());
        let at = Utc::now();
        let predictor = Predictor::new();

        let first = predictor.predict_at(&artifact, &vector, at).unwrap();
        let second = predictor.predict_at(&artifact, &vector, at).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_schema_mismatch() {
        let churn = churn_artifact();
        let ltv = ltv_artifact();
        let vector = aligned(&ltv, &sample_record());
        let predictor = Predictor::new();

        let err = predictor.predict(&churn, &vector).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));

        let mut short = aligned(&churn, &sample_record());
        short.values.pop();
        let err = predictor.predict(&churn, &short).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_non_finite_input_is_inference_failure() {
        let artifact = churn_artifact();
        let mut vector = aligned(&artifact, &sample_record());
        vector.values[0] = f64::NAN;

        let predictor = Predictor::new();
        let err = predictor.predict(&artifact, &vector).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InferenceFailure {
                model_type: ModelType::Churn,
                ..
            }
        ));
        let stats = predictor.stats();
        assert_eq!(stats.total_inferences, 1);
        assert_eq!(stats.failed_inferences, 1);
    }
}
