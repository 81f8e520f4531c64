use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::features::FEATURE_NAMES;
use crate::model::{LinearModel, RegressionMetrics};
use crate::walkforward::{FoldReport, WalkForwardReport};

pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    #[serde(default)]
    pub folds: Vec<FoldReport>,
    pub mean: RegressionMetrics,
    #[serde(default)]
    pub out_of_sample_rows: usize,
}

/// The deployable bundle of one training run. Immutable once written: a new
/// run produces a new artifact, never an in-place update. The recorded
/// feature-name order is the only valid order for inference input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub trained_at: String,
    pub feature_names: Vec<String>,
    pub model: LinearModel,
    pub validation: ValidationSummary,
    #[serde(default)]
    pub train_rows: usize,
}

impl ModelArtifact {
    pub fn new(model: LinearModel, report: &WalkForwardReport, train_rows: usize) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            trained_at: Utc::now().to_rfc3339(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model,
            validation: ValidationSummary {
                folds: report.folds.clone(),
                mean: report.aggregate,
                out_of_sample_rows: report.predictions.len(),
            },
            train_rows,
        }
    }

    /// Exact name-and-order comparison against the layout a caller is about
    /// to feed the model. Any divergence aborts the inference call; the
    /// artifact is never reordered or padded to fit.
    pub fn check_schema(&self, built: &[&str]) -> Result<(), CoreError> {
        let len = self.feature_names.len().max(built.len());
        for position in 0..len {
            let recorded = self.feature_names.get(position).map(String::as_str);
            let incoming = built.get(position).copied();
            if recorded != incoming {
                return Err(CoreError::FeatureSchemaMismatch {
                    position,
                    artifact: recorded.unwrap_or("<missing>").to_string(),
                    built: incoming.unwrap_or("<missing>").to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Atomic write: serialize next to the target, then rename over it.
pub fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let json = serde_json::to_string_pretty(artifact).context("serialize model artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap into {}", path.display()))?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<ModelArtifact, CoreError> {
    if !path.exists() {
        return Err(CoreError::ModelArtifactMissing {
            path: path.display().to_string(),
        });
    }
    let raw = fs::read_to_string(path).map_err(|err| CoreError::ArtifactUnreadable {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    serde_json::from_str::<ModelArtifact>(&raw).map_err(|err| CoreError::ArtifactUnreadable {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}
