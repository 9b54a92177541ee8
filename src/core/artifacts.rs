use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::FamilyModel;
use crate::error::{GestureError, Result};
use crate::models::{Family, FeatureVector, Label, LabelSet, PredictionResult};

/// A trained classifier plus the facts needed to trust it after a restart.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub family: Family,
    pub feature_len: usize,
    /// Class index to label
    pub classes: Vec<Label>,
    pub sample_count: usize,
    pub per_label_counts: BTreeMap<Label, usize>,
    pub trained_at: String,
    pub model: FamilyModel,
}

impl ModelArtifact {
    /// Reject artifacts that cannot serve the current configuration.
    pub fn check(&self, family: Family, feature_len: usize, labels: &LabelSet) -> Result<()> {
        if self.family != family || self.model.family() != family {
            return Err(GestureError::FamilyMismatch {
                expected: family,
                found: self.model.family(),
            });
        }
        if self.feature_len != feature_len || self.model.n_features() != feature_len {
            return Err(GestureError::Artifact(format!(
                "artifact encodes {} features, encoder produces {}",
                self.model.n_features(),
                feature_len
            )));
        }
        if self.classes.len() != self.model.n_classes() {
            return Err(GestureError::Artifact(format!(
                "artifact lists {} classes but the classifier has {}",
                self.classes.len(),
                self.model.n_classes()
            )));
        }
        if let Some(unknown) = self.classes.iter().find(|l| !labels.contains(l)) {
            return Err(GestureError::Artifact(format!(
                "artifact label {unknown} is not configured"
            )));
        }
        self.model.validate()
    }

    pub fn predict(&self, vector: &FeatureVector) -> Result<PredictionResult> {
        let scored = self.model.score(vector)?;
        let label = self.classes.get(scored.class).cloned().ok_or_else(|| {
            GestureError::Artifact(format!("class index {} has no label", scored.class))
        })?;
        Ok(PredictionResult {
            label,
            confidence: scored.confidence,
        })
    }
}

/// Persistence boundary for trained models: one artifact per family.
pub trait ModelRepository: Send + Sync {
    /// Replace the family's artifact, returning where it was written.
    fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf>;

    /// The family's artifact, or `None` if none was ever saved.
    fn load(&self, family: Family) -> Result<Option<ModelArtifact>>;

    fn location(&self, family: Family) -> PathBuf;
}

/// JSON artifacts in a directory, replaced atomically via rename.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    dir: PathBuf,
}

impl FsModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl ModelRepository for FsModelStore {
    fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.location(artifact.family);
        fs::create_dir_all(&self.dir).map_err(|e| GestureError::storage(&self.dir, e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}_model", artifact.family))
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| GestureError::storage(&self.dir, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, artifact)?;
            writer.flush().map_err(|e| GestureError::storage(&path, e))?;
        }
        temp.persist(&path)
            .map_err(|e| GestureError::storage(&path, e.error))?;

        tracing::info!("Saved {} model to {}", artifact.family, path.display());
        Ok(path)
    }

    fn load(&self, family: Family) -> Result<Option<ModelArtifact>> {
        let path = self.location(family);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GestureError::storage(&path, e)),
        };
        let artifact: ModelArtifact = serde_json::from_str(&text)?;
        Ok(Some(artifact))
    }

    fn location(&self, family: Family) -> PathBuf {
        self.dir.join(format!("{}_model.json", family))
    }
}
