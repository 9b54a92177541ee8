use std::collections::BTreeMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::artifacts::{ModelArtifact, ModelRepository};
use super::registry::{ModelOrigin, ModelRegistry};
use crate::classifier::{FamilyModel, KernelSvm, KnnClassifier, stack_rows};
use crate::config::TrainingConfig;
use crate::dataset::{Aggregator, SampleRepository, TrainingSet};
use crate::encoding::FeatureEncoder;
use crate::error::{GestureError, Result};
use crate::models::{Family, Label, LabelSet, TrainOutcome};

/// Builds and persists a classifier from the stored dataset.
pub struct Trainer<'a, S, M> {
    pub(crate) store: &'a S,
    pub(crate) models: &'a M,
    pub(crate) encoder: &'a FeatureEncoder,
    pub(crate) registry: &'a ModelRegistry,
    pub(crate) labels: &'a LabelSet,
    pub(crate) params: &'a TrainingConfig,
}

impl<'a, S: SampleRepository, M: ModelRepository> Trainer<'a, S, M> {
    /// Aggregate, fit, persist and install a model for `family`.
    ///
    /// Too little data or a failed fit/persist leaves the resident model and
    /// the stored artifact untouched and reports `success: false`.
    pub fn train(&self, family: Family) -> TrainOutcome {
        let _guard = self.registry.training_guard(family);
        self.train_locked(family)
    }

    /// Train only if no model is resident once the family's training scope
    /// is held. Callers racing here train once; the rest get that model.
    pub fn train_if_absent(&self, family: Family) -> Option<TrainOutcome> {
        let _guard = self.registry.training_guard(family);
        if self.registry.is_resident(family) {
            tracing::debug!("{} model appeared while waiting to train", family);
            return None;
        }
        Some(self.train_locked(family))
    }

    /// Body of [`Trainer::train`]; the caller holds the training guard.
    fn train_locked(&self, family: Family) -> TrainOutcome {
        tracing::info!("Training {} model", family);

        let set = Aggregator::new(self.store, self.encoder, self.params.max_samples_per_label)
            .load(self.labels.iter(), family);
        let failed = |message: String| {
            tracing::warn!("Training {} model failed: {}", family, message);
            TrainOutcome {
                family,
                success: false,
                sample_count: set.len(),
                per_label_counts: set.counts.clone(),
                skipped: set.skipped,
                version: None,
                message: Some(message),
            }
        };

        let required = self.params.min_samples(family);
        if set.len() < required {
            return failed(format!(
                "not enough samples: found {}, need at least {}",
                set.len(),
                required
            ));
        }
        let classes = set.present_labels();
        if classes.len() < 2 {
            return failed(format!(
                "samples for at least two labels are required, found {}",
                classes.len()
            ));
        }

        let artifact = match self.fit(&set, classes) {
            Ok(artifact) => artifact,
            Err(e) => return failed(e.to_string()),
        };
        if let Err(e) = self.models.save(&artifact) {
            return failed(format!("could not persist model: {e}"));
        }

        let resident = self.registry.install(artifact, ModelOrigin::Trained);
        tracing::info!(
            "Trained {} model version {} on {} samples",
            family,
            resident.version,
            set.len()
        );

        TrainOutcome {
            family,
            success: true,
            sample_count: set.len(),
            per_label_counts: set.counts.clone(),
            skipped: set.skipped,
            version: Some(resident.version),
            message: None,
        }
    }

    fn fit(&self, set: &TrainingSet, classes: Vec<Label>) -> Result<ModelArtifact> {
        let family = set.family;
        let feature_len = self.encoder.feature_len(family);
        let index: BTreeMap<Label, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();

        let x = stack_rows(set.samples.iter().map(|(v, _)| v.as_slice()), feature_len)?;
        let y = set
            .samples
            .iter()
            .map(|(_, label)| {
                index.get(label).copied().ok_or_else(|| {
                    GestureError::Training(format!("sample label {label} has no class index"))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let model = match family {
            Family::Pixel => FamilyModel::Pixel(KernelSvm::fit(&self.params.svm, &x, &y, classes.len())?),
            Family::Landmark => {
                FamilyModel::Landmark(KnnClassifier::fit(self.params.knn_neighbors, x, y, classes.len())?)
            }
        };

        let trained_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| GestureError::Training(format!("cannot format timestamp: {e}")))?;

        Ok(ModelArtifact {
            family,
            feature_len,
            classes,
            sample_count: set.len(),
            per_label_counts: set.counts.clone(),
            trained_at,
            model,
        })
    }
}
