//! ONNX estimators evaluated with tract
//!
//! Models exported from training as ONNX take a `[1, n_features]` f32
//! input. Classifiers must expose their class probabilities as a `[1, 2]`
//! float output (export with the probability map disabled); regressors
//! return a single float.

use super::estimator::{Classifier, Regressor};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX graph compiled for a fixed input width
pub struct OnnxEstimator {
    model: TractModel,
    n_features: usize,
}

impl OnnxEstimator {
    /// Load and optimize an ONNX model from bytes
    pub fn from_bytes(model_bytes: &[u8], n_features: usize) -> Result<Self, String> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| format!("failed to parse ONNX model: {}", e))?
            .with_input_fact(0, f32::fact([1, n_features]).into())
            .map_err(|e| format!("failed to set input shape: {}", e))?
            .into_optimized()
            .map_err(|e| format!("failed to optimize model: {}", e))?
            .into_runnable()
            .map_err(|e| format!("failed to create runnable model: {}", e))?;

        debug!(bytes = model_bytes.len(), n_features, "ONNX estimator loaded");
        Ok(Self { model, n_features })
    }

    /// Run the graph and return every output flattened to f32
    fn run(&self, features: &[f64]) -> Result<Vec<Vec<f32>>, String> {
        if features.len() != self.n_features {
            return Err(format!(
                "model expects {} features, got {}",
                self.n_features,
                features.len()
            ));
        }
        if features.iter().any(|x| !x.is_finite()) {
            return Err("input contains a non-finite value".to_string());
        }

        let start = Instant::now();
        let data: Vec<f32> = features.iter().map(|x| *x as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.n_features), data)
            .map_err(|e| format!("failed to build input tensor: {}", e))?
            .into();

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| format!("ONNX run failed: {}", e))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        }

        // Integer outputs such as the predicted label are skipped
        Ok(outputs
            .iter()
            .filter_map(|t| t.to_array_view::<f32>().ok())
            .map(|view| view.iter().copied().collect())
            .collect())
    }
}

impl Classifier for OnnxEstimator {
    fn predict_proba(&self, features: &[f64]) -> Result<[f64; 2], String> {
        let outputs = self.run(features)?;
        let probabilities = outputs
            .iter()
            .find(|values| values.len() == 2)
            .ok_or_else(|| "model has no [1, 2] probability output".to_string())?;

        let p1 = probabilities[1] as f64;
        if !p1.is_finite() {
            return Err("model produced a non-finite probability".to_string());
        }
        let p1 = p1.clamp(0.0, 1.0);
        Ok([1.0 - p1, p1])
    }
}

impl Regressor for OnnxEstimator {
    fn predict(&self, features: &[f64]) -> Result<f64, String> {
        let outputs = self.run(features)?;
        let value = outputs
            .first()
            .and_then(|values| values.first())
            .copied()
            .ok_or_else(|| "model returned no output".to_string())? as f64;

        if !value.is_finite() {
            return Err("model produced a non-finite value".to_string());
        }
        Ok(value)
    }
}
