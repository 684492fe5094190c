//! Versioned model artifacts and the store that owns them
//!
//! Each `(model_type, version)` pair is a bundle of three files in the
//! models directory, named `{artifact_kind}_{version}`:
//!
//! - `{model}_features_{version}.json`: ordered training column names
//! - `{model}_scaler_{version}.json`: fitted [`StandardScaler`]
//! - `{model}_model_{version}.json` or `.onnx`: the trained estimator
//!
//! The store loads both model types eagerly. Any missing or invalid file
//! fails the whole load, so a store either serves every model or does not
//! exist.

mod estimator;
mod manifest;
mod onnx;
mod scaler;

pub use estimator::{
    Classifier, DecisionTree, Estimator, EstimatorSpec, ExplainableModel, NativeEstimator,
    Regressor,
};
pub use manifest::{compute_checksum, ArtifactManifest};
pub use onnx::OnnxEstimator;
pub use scaler::StandardScaler;

use crate::error::{PipelineError, Result};
use crate::features::validate_schema;
use crate::models::{ModelType, ModelsDescription};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of an artifact file without extension, e.g. `churn_scaler_v1.0.0`
pub fn artifact_file_stem(model_type: ModelType, kind: &str, version: &str) -> String {
    format!("{}_{}_{}", model_type, kind, version)
}

/// Everything needed to run one trained model
#[derive(Debug)]
pub struct ModelArtifact {
    pub model_type: ModelType,
    pub version: String,
    pub estimator: Estimator,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
    /// Estimator family, e.g. `gradient_boosting` or `onnx`
    pub backend: String,
}

impl ModelArtifact {
    /// Assemble an artifact, checking that its parts agree on the schema
    pub fn new(
        model_type: ModelType,
        version: impl Into<String>,
        estimator: Estimator,
        scaler: StandardScaler,
        feature_names: Vec<String>,
        backend: impl Into<String>,
    ) -> std::result::Result<Self, String> {
        validate_schema(&feature_names)?;
        scaler.validate()?;
        if scaler.n_features() != feature_names.len() {
            return Err(format!(
                "scaler was fitted on {} columns but the schema has {}",
                scaler.n_features(),
                feature_names.len()
            ));
        }

        match (&estimator, model_type) {
            (Estimator::Classifier(_), ModelType::Churn) | (Estimator::Regressor(_), ModelType::Ltv) => {}
            _ => {
                return Err(format!(
                    "{} model needs a {} but got a {}",
                    model_type,
                    if model_type == ModelType::Churn { "classifier" } else { "regressor" },
                    estimator.kind()
                ))
            }
        }

        if let Some(explain) = estimator.explainable() {
            let n = explain.feature_importances().len();
            if n != feature_names.len() {
                return Err(format!(
                    "{} feature importances for {} features",
                    n,
                    feature_names.len()
                ));
            }
        }

        Ok(Self {
            model_type,
            version: version.into(),
            estimator,
            scaler,
            feature_names,
            backend: backend.into(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Load one bundle from `models_dir`
    pub fn load(
        models_dir: &Path,
        model_type: ModelType,
        version: &str,
        manifest: Option<&ArtifactManifest>,
    ) -> Result<Self> {
        let features_path = models_dir.join(format!(
            "{}.json",
            artifact_file_stem(model_type, "features", version)
        ));
        let feature_names: Vec<String> = parse_json(&read_artifact(&features_path, manifest)?, &features_path)?;

        let scaler_path = models_dir.join(format!(
            "{}.json",
            artifact_file_stem(model_type, "scaler", version)
        ));
        let scaler: StandardScaler = parse_json(&read_artifact(&scaler_path, manifest)?, &scaler_path)?;

        let (estimator, backend, model_path) =
            load_estimator(models_dir, model_type, version, feature_names.len(), manifest)?;

        let artifact = Self::new(model_type, version, estimator, scaler, feature_names, backend)
            .map_err(|reason| PipelineError::invalid(&model_path, reason))?;

        debug!(
            model_type = %model_type,
            version = %version,
            backend = %artifact.backend,
            features = artifact.n_features(),
            "Artifact loaded"
        );
        Ok(artifact)
    }
}

/// Locate and load the estimator, preferring the native JSON form
fn load_estimator(
    models_dir: &Path,
    model_type: ModelType,
    version: &str,
    n_features: usize,
    manifest: Option<&ArtifactManifest>,
) -> Result<(Estimator, String, PathBuf)> {
    let stem = artifact_file_stem(model_type, "model", version);
    let json_path = models_dir.join(format!("{}.json", stem));
    let onnx_path = models_dir.join(format!("{}.onnx", stem));

    if json_path.exists() {
        let spec: EstimatorSpec = parse_json(&read_artifact(&json_path, manifest)?, &json_path)?;
        let native = NativeEstimator::new(spec, n_features)
            .map_err(|reason| PipelineError::invalid(&json_path, reason))?;
        let backend = native.kind().to_string();

        let estimator = match model_type {
            ModelType::Churn if native.supports_classification() => {
                Estimator::Classifier(Box::new(native))
            }
            ModelType::Ltv if native.supports_regression() => Estimator::Regressor(Box::new(native)),
            _ => {
                return Err(PipelineError::invalid(
                    &json_path,
                    format!("{} estimator cannot serve the {} model", backend, model_type),
                ))
            }
        };
        return Ok((estimator, backend, json_path));
    }

    if onnx_path.exists() {
        let bytes = read_artifact(&onnx_path, manifest)?;
        let onnx = OnnxEstimator::from_bytes(&bytes, n_features)
            .map_err(|reason| PipelineError::invalid(&onnx_path, reason))?;
        let estimator = match model_type {
            ModelType::Churn => Estimator::Classifier(Box::new(onnx)),
            ModelType::Ltv => Estimator::Regressor(Box::new(onnx)),
        };
        return Ok((estimator, "onnx".to_string(), onnx_path));
    }

    Err(PipelineError::ArtifactNotFound { path: json_path })
}

fn read_artifact(path: &Path, manifest: Option<&ArtifactManifest>) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(PipelineError::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    if let Some(manifest) = manifest {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        manifest.verify(&file_name, &bytes)?;
    }
    Ok(bytes)
}

fn parse_json<T: serde::de::DeserializeOwned>(bytes: &[u8], path: &Path) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| PipelineError::invalid(path, e.to_string()))
}

/// Immutable set of loaded artifacts for one version
#[derive(Debug)]
pub struct ArtifactStore {
    version: String,
    artifacts: HashMap<ModelType, Arc<ModelArtifact>>,
}

impl ArtifactStore {
    /// Load every model type for `version`. Fails on the first missing or
    /// invalid artifact; nothing is kept from a failed load.
    pub fn load_all(models_dir: &Path, version: &str, verify_checksums: bool) -> Result<Self> {
        info!(models_dir = %models_dir.display(), version = %version, "Loading model artifacts");

        let manifest = if verify_checksums {
            ArtifactManifest::load(&models_dir.join(format!("manifest_{}.json", version)))?
        } else {
            None
        };

        let mut artifacts = Vec::with_capacity(ModelType::ALL.len());
        for model_type in ModelType::ALL {
            artifacts.push(ModelArtifact::load(models_dir, model_type, version, manifest.as_ref())?);
        }

        let store = Self::from_artifacts(version, artifacts)?;
        info!(
            version = %version,
            churn_features = store.feature_count(ModelType::Churn),
            ltv_features = store.feature_count(ModelType::Ltv),
            "All model artifacts loaded"
        );
        Ok(store)
    }

    /// Build a store from already assembled artifacts. Every model type
    /// must be present exactly once and match `version`.
    pub fn from_artifacts(version: &str, artifacts: Vec<ModelArtifact>) -> Result<Self> {
        let mut map = HashMap::with_capacity(artifacts.len());
        for artifact in artifacts {
            if artifact.version != version {
                return Err(PipelineError::invalid(
                    artifact_file_stem(artifact.model_type, "model", &artifact.version),
                    format!("expected version {}", version),
                ));
            }
            let model_type = artifact.model_type;
            if map.insert(model_type, Arc::new(artifact)).is_some() {
                return Err(PipelineError::invalid(
                    artifact_file_stem(model_type, "model", version),
                    "duplicate artifact for model type",
                ));
            }
        }
        if let Some(missing) = ModelType::ALL.into_iter().find(|t| !map.contains_key(t)) {
            return Err(PipelineError::ModelNotLoaded(missing));
        }

        Ok(Self {
            version: version.to_string(),
            artifacts: map,
        })
    }

    pub fn get(&self, model_type: ModelType) -> Result<Arc<ModelArtifact>> {
        self.artifacts
            .get(&model_type)
            .cloned()
            .ok_or(PipelineError::ModelNotLoaded(model_type))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn model_types(&self) -> Vec<ModelType> {
        let mut types: Vec<ModelType> = self.artifacts.keys().copied().collect();
        types.sort();
        types
    }

    pub fn feature_count(&self, model_type: ModelType) -> usize {
        self.artifacts
            .get(&model_type)
            .map(|a| a.n_features())
            .unwrap_or(0)
    }

    pub fn describe(&self) -> ModelsDescription {
        ModelsDescription {
            version: self.version.clone(),
            models_loaded: self.model_types(),
            feature_counts: self
                .artifacts
                .iter()
                .map(|(t, a)| (*t, a.n_features()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;
    use crate::predictor::Predictor;
    use crate::testing::{write_model_dir, CHURN_FEATURES, LTV_FEATURES};
    use std::fs;

    #[test]
    fn test_file_stem() {
        assert_eq!(
            artifact_file_stem(ModelType::Churn, "scaler", "v1.0.0"),
            "churn_scaler_v1.0.0"
        );
    }

    #[test]
    fn test_load_all() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");

        let store = ArtifactStore::load_all(dir.path(), "v1.0.0", true).unwrap();
        assert_eq!(store.version(), "v1.0.0");
        assert_eq!(store.model_types(), vec![ModelType::Churn, ModelType::Ltv]);
        assert_eq!(store.feature_count(ModelType::Churn), CHURN_FEATURES.len());
        assert_eq!(store.feature_count(ModelType::Ltv), LTV_FEATURES.len());

        let churn = store.get(ModelType::Churn).unwrap();
        assert_eq!(churn.backend, "gradient_boosting");
        assert!(churn.estimator.explainable().is_some());

        let description = store.describe();
        assert_eq!(description.feature_counts[&ModelType::Ltv], LTV_FEATURES.len());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        fs::remove_file(dir.path().join("ltv_scaler_v1.0.0.json")).unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", true).unwrap_err();
        assert!(err.is_fatal());
        match err {
            PipelineError::ArtifactNotFound { path } => {
                assert!(path.ends_with("ltv_scaler_v1.0.0.json"))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_wrong_version_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        let err = ArtifactStore::load_all(dir.path(), "v2.0.0", true).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_scaler_width_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        fs::write(
            dir.path().join("churn_scaler_v1.0.0.json"),
            r#"{"mean": [0.0], "scale": [1.0]}"#,
        )
        .unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", false).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactInvalid { .. }));
        assert!(err.to_string().contains("scaler"));
    }

    #[test]
    fn test_checksum_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        fs::write(
            dir.path().join("manifest_v1.0.0.json"),
            r#"{"files": {"churn_features_v1.0.0.json": "00"}}"#,
        )
        .unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", true).unwrap_err();
        assert!(matches!(err, PipelineError::ChecksumMismatch { .. }));

        // Verification can be switched off
        assert!(ArtifactStore::load_all(dir.path(), "v1.0.0", false).is_ok());
    }

    #[test]
    fn test_incomplete_membership_dummies_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        let partial: Vec<&str> = LTV_FEATURES
            .iter()
            .copied()
            .filter(|n| *n != "membership_type_id_3")
            .collect();
        fs::write(
            dir.path().join("ltv_features_v1.0.0.json"),
            serde_json::to_string(&partial).unwrap(),
        )
        .unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_regressor_spec_for_churn_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        let coefficients = vec![0.0; CHURN_FEATURES.len()];
        fs::write(
            dir.path().join("churn_model_v1.0.0.json"),
            serde_json::json!({"kind": "linear", "coefficients": coefficients, "intercept": 0.0})
                .to_string(),
        )
        .unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", false).unwrap_err();
        assert!(err.to_string().contains("cannot serve the churn model"));
    }

    #[test]
    fn test_onnx_fallback_rejects_corrupt_graph() {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        fs::remove_file(dir.path().join("churn_model_v1.0.0.json")).unwrap();
        fs::write(dir.path().join("churn_model_v1.0.0.onnx"), b"not a protobuf graph").unwrap();

        let err = ArtifactStore::load_all(dir.path(), "v1.0.0", false).unwrap_err();
        match err {
            PipelineError::ArtifactInvalid { path, .. } => {
                assert!(path.ends_with("churn_model_v1.0.0.onnx"))
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    fn install_onnx_model(dir: &Path, model_type: ModelType, fixture: &str) {
        let source = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(fixture);
        fs::remove_file(dir.join(format!("{}_model_v1.0.0.json", model_type))).unwrap();
        fs::copy(source, dir.join(format!("{}_model_v1.0.0.onnx", model_type))).unwrap();
    }

    fn onnx_store() -> ArtifactStore {
        let dir = tempfile::tempdir().unwrap();
        write_model_dir(dir.path(), "v1.0.0");
        install_onnx_model(dir.path(), ModelType::Churn, "churn_linear.onnx");
        install_onnx_model(dir.path(), ModelType::Ltv, "ltv_linear.onnx");
        ArtifactStore::load_all(dir.path(), "v1.0.0", false).unwrap()
    }

    #[test]
    fn test_onnx_classifier_reads_probability_output() {
        let store = onnx_store();
        let churn = store.get(ModelType::Churn).unwrap();
        assert_eq!(churn.backend, "onnx");
        assert!(churn.estimator.explainable().is_none());

        let Estimator::Classifier(model) = &churn.estimator else {
            panic!("churn model should be a classifier");
        };
        // p1 = sigmoid(x0)
        let mut x = vec![0.0; CHURN_FEATURES.len()];
        let [p0, p1] = model.predict_proba(&x).unwrap();
        assert!((p0 - 0.5).abs() < 1e-5);
        assert!((p1 - 0.5).abs() < 1e-5);

        x[0] = 1.0;
        let [p0, p1] = model.predict_proba(&x).unwrap();
        assert!((p1 - 0.731_058_6).abs() < 1e-5);
        assert!((p0 + p1 - 1.0).abs() < 1e-9);
        assert_eq!(model.predict(&x).unwrap(), 1);

        x[0] = f64::NAN;
        assert!(model.predict_proba(&x).is_err());
    }

    #[test]
    fn test_onnx_regressor_reads_first_output() {
        let store = onnx_store();
        let ltv = store.get(ModelType::Ltv).unwrap();
        assert_eq!(ltv.backend, "onnx");

        let Estimator::Regressor(model) = &ltv.estimator else {
            panic!("ltv model should be a regressor");
        };
        // value = 100 * x0 + 300
        let mut x = vec![0.0; LTV_FEATURES.len()];
        assert_eq!(model.predict(&x).unwrap(), 300.0);
        x[0] = 2.0;
        assert_eq!(model.predict(&x).unwrap(), 500.0);
        assert!(model.predict(&x[..3]).is_err());
    }

    #[test]
    fn test_onnx_predictions_have_no_importances() {
        let store = onnx_store();
        let predictor = Predictor::new();

        // Scaled days_since_last_run of 1.0
        let mut churn_values = vec![0.0; CHURN_FEATURES.len()];
        churn_values[0] = 20.0;
        let churn = predictor
            .predict(
                &store.get(ModelType::Churn).unwrap(),
                &FeatureVector {
                    model_type: ModelType::Churn,
                    values: churn_values,
                    defaulted: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(churn.output.score(), 0.7311);
        assert_eq!(churn.output.label(), "HIGH");
        assert!(churn.feature_importance.is_empty());

        // Scaled running_sessions_count of 1.0
        let mut ltv_values = vec![0.0; LTV_FEATURES.len()];
        ltv_values[0] = 35.0;
        let ltv = predictor
            .predict(
                &store.get(ModelType::Ltv).unwrap(),
                &FeatureVector {
                    model_type: ModelType::Ltv,
                    values: ltv_values,
                    defaulted: Vec::new(),
                },
            )
            .unwrap();
        assert_eq!(ltv.output.score(), 400.0);
        assert_eq!(ltv.output.label(), "MEDIUM");
        assert!(ltv.feature_importance.is_empty());
    }

    #[test]
    fn test_from_artifacts_requires_every_model() {
        let err = ArtifactStore::from_artifacts("v1.0.0", Vec::new()).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotLoaded(ModelType::Churn)));
    }
}
