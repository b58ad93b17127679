//! Trained artifact persistence
//!
//! The artifact is a single JSON document holding the fitted pipeline, the
//! feature schema it was trained against and the run metadata. It is written
//! to a sibling temporary file and renamed into place, so readers only ever
//! observe a complete artifact.

use crate::data::FeatureSchema;
use crate::error::{ChurnError, Result};
use crate::pipeline::ChurnPipeline;
use crate::training::TrialParams;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Artifact layout version understood by this build
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Facts about the training run that produced an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Winning candidate
    pub model_name: String,
    /// Hyperparameters of the winner
    pub params: TrialParams,
    pub cv_roc_auc: f64,
    pub test_roc_auc: f64,
    /// Test ROC-AUC of every candidate
    pub candidate_scores: BTreeMap<String, f64>,
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_test: usize,
    /// Rows removed while loading the dataset
    pub dropped_rows: usize,
    pub seed: u64,
    /// Probability at or above which churn is predicted
    pub threshold: f64,
    /// Model input columns after preprocessing
    pub feature_names: Vec<String>,
    pub crate_version: String,
}

/// Persisted, fitted preprocessing + model bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnArtifact {
    pub format_version: u32,
    pub schema: FeatureSchema,
    pub pipeline: ChurnPipeline,
    pub metadata: ArtifactMetadata,
}

/// Hex SHA-256 of a byte slice
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

impl ChurnArtifact {
    pub fn new(schema: FeatureSchema, pipeline: ChurnPipeline, metadata: ArtifactMetadata) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            schema,
            pipeline,
            metadata,
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "artifact".into());
        name.push(format!(".tmp-{}", std::process::id()));
        path.with_file_name(name)
    }

    /// Write the artifact, replacing any previous one at `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !self.pipeline.is_fitted() {
            return Err(ChurnError::ModelNotFitted);
        }

        let bytes = serde_json::to_vec(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = Self::temp_path(path);
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        };
        if let Err(e) = write() {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary artifact file");
                }
            }
            return Err(ChurnError::ArtifactError(format!(
                "failed to write artifact to {}: {}",
                path.display(),
                e
            )));
        }

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            sha256 = %compute_sha256(&bytes),
            model = %self.metadata.model_name,
            "Artifact saved"
        );
        Ok(())
    }

    /// Read and verify an artifact against the compiled feature schema
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            ChurnError::ArtifactError(format!("cannot read artifact {}: {}", path.display(), e))
        })?;

        let artifact: ChurnArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            ChurnError::ArtifactError(format!("corrupt artifact {}: {}", path.display(), e))
        })?;
        artifact.verify(&FeatureSchema::telco())?;

        info!(
            path = %path.display(),
            sha256 = %compute_sha256(&bytes),
            model = %artifact.metadata.model_name,
            trained_at = %artifact.metadata.trained_at,
            "Artifact loaded"
        );
        Ok(artifact)
    }

    /// Check format version, pinned schema and fitted state
    pub fn verify(&self, expected: &FeatureSchema) -> Result<()> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ChurnError::SchemaMismatch(format!(
                "artifact format version {} is not supported (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if &self.schema != expected {
            let pinned = self.schema.column_names();
            let compiled = expected.column_names();
            let detail = match pinned.iter().zip(&compiled).position(|(a, b)| a != b) {
                Some(i) => format!("column {} is {:?}, expected {:?}", i, pinned[i], compiled[i]),
                None if pinned.len() != compiled.len() => {
                    format!("{} columns, expected {}", pinned.len(), compiled.len())
                }
                None => "column kinds or categories differ".to_string(),
            };
            return Err(ChurnError::SchemaMismatch(format!(
                "artifact was trained against a different feature schema: {}",
                detail
            )));
        }
        if self.pipeline.preprocessor().schema() != expected {
            return Err(ChurnError::SchemaMismatch(
                "pipeline preprocessor schema differs from the pinned schema".to_string(),
            ));
        }
        if !self.pipeline.is_fitted() {
            return Err(ChurnError::ArtifactError("artifact pipeline is not fitted".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelKind;

    fn unfitted_artifact() -> ChurnArtifact {
        let schema = FeatureSchema::telco();
        let classifier = ModelKind::Logreg.build(&TrialParams::default(), 42).unwrap();
        let metadata = ArtifactMetadata {
            model_name: "logreg".to_string(),
            params: TrialParams::default(),
            cv_roc_auc: 0.0,
            test_roc_auc: 0.0,
            candidate_scores: BTreeMap::new(),
            trained_at: Utc::now(),
            n_train: 0,
            n_test: 0,
            dropped_rows: 0,
            seed: 42,
            threshold: 0.5,
            feature_names: Vec::new(),
            crate_version: crate::VERSION.to_string(),
        };
        ChurnArtifact::new(schema.clone(), ChurnPipeline::new(schema, classifier), metadata)
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            compute_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = ChurnArtifact::temp_path(Path::new("models/churn_model.json"));
        assert_eq!(tmp.parent(), Some(Path::new("models")));
        assert!(tmp.to_string_lossy().contains("churn_model.json.tmp-"));
    }

    #[test]
    fn test_unfitted_artifact_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let err = unfitted_artifact().save(&path).unwrap_err();
        assert!(matches!(err, ChurnError::ModelNotFitted));
        assert!(!path.exists());
    }

    #[test]
    fn test_verify_rejects_other_schema() {
        let artifact = unfitted_artifact();
        let mut columns = FeatureSchema::telco().columns().to_vec();
        columns.pop();
        let err = artifact.verify(&FeatureSchema::new(columns)).unwrap_err();
        assert!(matches!(err, ChurnError::SchemaMismatch(_)));
    }

    #[test]
    fn test_verify_rejects_unfitted_pipeline() {
        let err = unfitted_artifact().verify(&FeatureSchema::telco()).unwrap_err();
        assert!(matches!(err, ChurnError::ArtifactError(_)));
    }
}
