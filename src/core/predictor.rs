use std::sync::Arc;

use image::DynamicImage;

use super::artifacts::ModelRepository;
use super::registry::{ModelOrigin, ResidentModel};
use super::trainer::Trainer;
use crate::dataset::SampleRepository;
use crate::encoding::FeatureEncoder;
use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::models::{Family, PredictionResult};

/// Prediction input; the variant selects the feature family.
#[derive(Debug, Clone)]
pub enum PredictInput {
    Image(DynamicImage),
    Landmarks(LandmarkSet),
}

impl PredictInput {
    pub fn family(&self) -> Family {
        match self {
            PredictInput::Image(_) => Family::Pixel,
            PredictInput::Landmarks(_) => Family::Landmark,
        }
    }
}

/// Scores single inputs against the resident model of their family.
pub struct Predictor<'a, S, M> {
    pub(crate) trainer: Trainer<'a, S, M>,
    /// Encoder used for the input itself; may differ from the training
    /// encoder only in where it writes debug images.
    pub(crate) encoder: &'a FeatureEncoder,
}

impl<'a, S: SampleRepository, M: ModelRepository> Predictor<'a, S, M> {
    /// Predict a label for `input`.
    ///
    /// Without a resident model the persisted artifact is loaded. If there is
    /// none, the pixel family trains once on the spot while the landmark
    /// family answers with the no-model sentinel. Only malformed input is an
    /// error; a low confidence is a normal result.
    pub fn predict(&self, input: &PredictInput) -> Result<PredictionResult> {
        let family = input.family();
        let Some(resident) = self.resolve(family) else {
            tracing::info!("No {} model available", family);
            return Ok(PredictionResult::no_model());
        };

        let vector = match input {
            PredictInput::Image(img) => self.encoder.encode_image(img)?,
            PredictInput::Landmarks(landmarks) => self.encoder.encode_landmarks(landmarks),
        };
        let result = resident.artifact.predict(&vector)?;

        tracing::debug!(
            "Predicted {} ({:.3}) with {} model version {}",
            result.label, result.confidence, family, resident.version
        );
        Ok(result)
    }

    /// Resident model for `family`, loading or training one if needed.
    pub fn resolve(&self, family: Family) -> Option<Arc<ResidentModel>> {
        if let Some(resident) = self.trainer.registry.current(family) {
            return Some(resident);
        }
        if let Some(resident) = self.load_persisted(family) {
            return Some(resident);
        }

        match family {
            Family::Pixel => {
                tracing::info!("No pixel model yet, training one before predicting");
                let failed = self
                    .trainer
                    .train_if_absent(family)
                    .is_some_and(|outcome| !outcome.success);
                if failed {
                    return None;
                }
                self.trainer.registry.current(family)
            }
            Family::Landmark => None,
        }
    }

    fn load_persisted(&self, family: Family) -> Option<Arc<ResidentModel>> {
        let artifact = match self.trainer.models.load(family) {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable {} model: {}", family, e);
                return None;
            }
        };

        let feature_len = self.trainer.encoder.feature_len(family);
        if let Err(e) = artifact.check(family, feature_len, self.trainer.labels) {
            tracing::warn!("Ignoring stale {} model: {}", family, e);
            return None;
        }

        let resident = self
            .trainer
            .registry
            .install_if_absent(artifact, ModelOrigin::Loaded);
        tracing::info!("Loaded {} model version {}", family, resident.version);
        Some(resident)
    }
}
