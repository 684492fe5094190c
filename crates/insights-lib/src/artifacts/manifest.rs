//! Optional checksum manifest for an artifact version
//!
//! `manifest_{version}.json` maps artifact file names to SHA-256 digests:
//!
//! ```json
//! { "files": { "churn_model_v1.0.0.json": "9f86d0…" } }
//! ```

use crate::error::{PipelineError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtifactManifest {
    pub files: HashMap<String, String>,
}

impl ArtifactManifest {
    /// Read the manifest if the version ships one
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "No artifact manifest, skipping checksum validation");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&content)
            .map_err(|e| PipelineError::invalid(path, format!("manifest is not valid JSON: {}", e)))?;
        Ok(Some(manifest))
    }

    /// Check `bytes` against the recorded digest for `file_name`.
    ///
    /// Files the manifest does not list are accepted with a warning.
    pub fn verify(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let Some(expected) = self.files.get(file_name) else {
            warn!(file = %file_name, "Artifact not listed in manifest");
            return Ok(());
        };

        let actual = compute_checksum(bytes);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(PipelineError::ChecksumMismatch {
                file: file_name.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        debug!(file = %file_name, checksum = %actual, "Artifact checksum validated");
        Ok(())
    }
}

/// Hex-encoded SHA-256 digest
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum() {
        assert_eq!(
            compute_checksum(b"test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[test]
    fn test_verify() {
        let mut files = HashMap::new();
        files.insert("a.json".to_string(), compute_checksum(b"payload"));
        let manifest = ArtifactManifest { files };

        assert!(manifest.verify("a.json", b"payload").is_ok());
        assert!(matches!(
            manifest.verify("a.json", b"tampered"),
            Err(PipelineError::ChecksumMismatch { .. })
        ));
        assert!(manifest.verify("unlisted.json", b"anything").is_ok());
    }

    #[test]
    fn test_missing_manifest_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ArtifactManifest::load(&dir.path().join("manifest_v1.json")).unwrap();
        assert!(loaded.is_none());
    }
}
