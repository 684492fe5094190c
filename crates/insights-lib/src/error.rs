//! Error types for the prediction pipeline

use crate::models::ModelType;
use std::path::PathBuf;

/// Errors raised while loading artifacts or running inference
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A required artifact file is missing. Fatal at startup.
    #[error("Artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    /// An artifact file exists but its contents are unusable
    #[error("Invalid artifact {}: {reason}", path.display())]
    ArtifactInvalid { path: PathBuf, reason: String },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// The store has no artifact for the requested model type
    #[error("Model not loaded: {0}")]
    ModelNotLoaded(ModelType),

    /// A feature vector does not match the artifact it is fed to
    #[error("Schema mismatch for {model_type} model: {reason}")]
    SchemaMismatch { model_type: ModelType, reason: String },

    /// The underlying model call failed
    #[error("Inference failed for {model_type} model: {reason}")]
    InferenceFailure { model_type: ModelType, reason: String },

    /// An input record could not be parsed
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Batch of {records} records exceeded {timeout_secs}s")]
    BatchTimeout { records: usize, timeout_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::ArtifactInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn inference(model_type: ModelType, reason: impl Into<String>) -> Self {
        PipelineError::InferenceFailure {
            model_type,
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the process from serving
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::ArtifactNotFound { .. }
                | PipelineError::ArtifactInvalid { .. }
                | PipelineError::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_errors_are_fatal() {
        let missing = PipelineError::ArtifactNotFound {
            path: PathBuf::from("models/churn_model_v1.0.0.json"),
        };
        assert!(missing.is_fatal());
        assert!(missing.to_string().contains("churn_model_v1.0.0.json"));

        let inference = PipelineError::inference(ModelType::Ltv, "boom");
        assert!(!inference.is_fatal());
        assert_eq!(inference.to_string(), "Inference failed for ltv model: boom");
    }
}
