use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use super::artifacts::{FsModelStore, ModelRepository};
use super::predictor::{PredictInput, Predictor};
use super::registry::{ModelOrigin, ModelRegistry};
use super::trainer::Trainer;
use crate::config::Config;
use crate::dataset::{DatasetStats, FsSampleStore, SampleRepository};
use crate::encoding::FeatureEncoder;
use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::models::{Family, Label, LabelSet, PredictionResult, TrainOutcome};
use crate::payload;

/// A sample as received from a caller, before validation.
#[derive(Debug, Clone)]
pub enum UploadSample {
    /// Raw image file bytes
    Image(Vec<u8>),
    /// Base64 image, optionally a `data:` URL
    ImageBase64(String),
    /// JSON landmark payload
    Landmarks(Value),
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub label: Label,
    pub family: Family,
    pub saved: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub resident: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<ModelOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<String>,
    pub artifact_path: PathBuf,
    pub artifact_exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub dataset_dir: PathBuf,
    pub model_dir: PathBuf,
    pub labels: Vec<Label>,
    pub models: BTreeMap<Family, ModelStatus>,
    pub dataset: DatasetStats,
}

/// Entry point tying storage, encoding, training and prediction together.
///
/// All operations take `&self`; the service can be shared across threads and
/// training of one family never blocks predictions.
pub struct GestureService<S = FsSampleStore, M = FsModelStore> {
    config: Config,
    labels: LabelSet,
    store: S,
    models: M,
    encoder: FeatureEncoder,
    inference_encoder: FeatureEncoder,
    registry: ModelRegistry,
    model_dir: PathBuf,
}

impl GestureService {
    /// Service over the directories named in `config`.
    pub fn open(config: Config) -> Result<Self> {
        let store = FsSampleStore::new(&config.storage.dataset_dir);
        let models = FsModelStore::new(&config.storage.model_dir);
        Self::with_stores(config, store, models)
    }
}

impl<S: SampleRepository, M: ModelRepository> GestureService<S, M> {
    pub fn with_stores(config: Config, store: S, models: M) -> Result<Self> {
        let labels = config.label_set()?;
        let encoder = FeatureEncoder::new(config.localizer.clone(), config.encoder.clone());
        let model_dir = config.storage.model_dir.clone();
        Ok(Self {
            labels,
            store,
            models,
            inference_encoder: encoder.clone(),
            encoder,
            registry: ModelRegistry::new(),
            model_dir,
            config,
        })
    }

    /// Dump the intermediate images of every predicted image below `dir`.
    pub fn with_debug_output(mut self, dir: PathBuf) -> Result<Self> {
        self.inference_encoder = self.encoder.clone().with_debug(dir)?;
        Ok(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Validate and persist one labeled sample.
    pub fn upload(&self, label: &str, sample: UploadSample) -> Result<UploadReceipt> {
        let label = self.labels.parse(label)?;
        let (family, saved) = match sample {
            UploadSample::Image(bytes) => (Family::Pixel, self.store.store_image(&label, &bytes)?),
            UploadSample::ImageBase64(text) => {
                let bytes = payload::decode_base64(&text)?;
                (Family::Pixel, self.store.store_image(&label, &bytes)?)
            }
            UploadSample::Landmarks(value) => {
                let landmarks = LandmarkSet::from_json(&value)?;
                (Family::Landmark, self.store.store_landmarks(&label, &landmarks)?)
            }
        };

        tracing::info!("Stored {} sample for {} at {}", family, label, saved.display());
        Ok(UploadReceipt { label, family, saved })
    }

    pub fn train(&self, family: Family) -> TrainOutcome {
        self.trainer().train(family)
    }

    pub fn predict(&self, input: &PredictInput) -> Result<PredictionResult> {
        Predictor {
            trainer: self.trainer(),
            encoder: &self.inference_encoder,
        }
        .predict(input)
    }

    pub fn trainer(&self) -> Trainer<'_, S, M> {
        Trainer {
            store: &self.store,
            models: &self.models,
            encoder: &self.encoder,
            registry: &self.registry,
            labels: &self.labels,
            params: &self.config.training,
        }
    }

    pub fn status(&self) -> StatusReport {
        let models = Family::ALL
            .into_iter()
            .map(|family| (family, self.model_status(family)))
            .collect();

        StatusReport {
            dataset_dir: self.store.root(),
            model_dir: self.model_dir.clone(),
            labels: self.labels.iter().cloned().collect(),
            models,
            dataset: self.store.stats(self.labels.iter()),
        }
    }

    fn model_status(&self, family: Family) -> ModelStatus {
        let artifact_path = self.models.location(family);
        let artifact_exists = artifact_path.is_file();
        match self.registry.current(family) {
            Some(resident) => ModelStatus {
                resident: true,
                version: Some(resident.version),
                origin: Some(resident.origin),
                sample_count: Some(resident.artifact.sample_count),
                trained_at: Some(resident.artifact.trained_at.clone()),
                artifact_path,
                artifact_exists,
            },
            None => ModelStatus {
                resident: false,
                version: None,
                origin: None,
                sample_count: None,
                trained_at: None,
                artifact_path,
                artifact_exists,
            },
        }
    }
}
