use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Family, LabelSet};

/// Runtime configuration, loaded from TOML. Every section has defaults so a
/// partial file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub labels: Vec<String>,
    pub storage: StorageConfig,
    pub localizer: LocalizerConfig,
    pub encoder: EncoderConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dataset_dir: PathBuf,
    pub model_dir: PathBuf,
}

/// Skin segmentation parameters. Thresholds are in YCrCb space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    pub cr_min: u8,
    pub cr_max: u8,
    pub cb_min: u8,
    pub cb_max: u8,
    pub blur_sigma: f32,
    pub open_radius: u8,
    pub padding_ratio: f32,
    /// Smallest region, as a fraction of the image area, accepted as a hand.
    pub min_area_fraction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub center_crop: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub max_samples_per_label: usize,
    pub min_pixel_samples: usize,
    pub min_landmark_samples: usize,
    pub knn_neighbors: usize,
    pub svm: SvmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    pub c: f32,
    /// RBF width. `None` uses `1 / (n_features * variance)`.
    pub gamma: Option<f32>,
    /// Solver stopping tolerance
    pub tolerance: f32,
    /// Let the solver drop bounded multipliers early
    pub shrinking: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            labels: ('A'..='Z').map(String::from).collect(),
            storage: StorageConfig::default(),
            localizer: LocalizerConfig::default(),
            encoder: EncoderConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            model_dir: PathBuf::from("models"),
        }
    }
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            cr_min: 133,
            cr_max: 173,
            cb_min: 77,
            cb_max: 127,
            blur_sigma: 1.5,
            open_radius: 2,
            padding_ratio: 0.15,
            min_area_fraction: 0.01,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            center_crop: 0.65,
        }
    }
}

impl EncoderConfig {
    /// Length of a pixel-family feature vector.
    pub fn feature_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_samples_per_label: 500,
            min_pixel_samples: 10,
            min_landmark_samples: 3,
            knn_neighbors: 3,
            svm: SvmConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn min_samples(&self, family: Family) -> usize {
        match family {
            Family::Pixel => self.min_pixel_samples,
            Family::Landmark => self.min_landmark_samples,
        }
    }
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 10.0,
            gamma: None,
            tolerance: 1e-3,
            shrinking: true,
        }
    }
}

impl Config {
    /// Load a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(&self.labels)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.label_set()?;
        if self.encoder.width == 0 || self.encoder.height == 0 {
            anyhow::bail!("encoder target size must be non-zero");
        }
        if !(self.encoder.center_crop > 0.0 && self.encoder.center_crop <= 1.0) {
            anyhow::bail!("encoder.center_crop must be in (0, 1]");
        }
        if self.localizer.padding_ratio < 0.0 {
            anyhow::bail!("localizer.padding_ratio must not be negative");
        }
        if self.training.knn_neighbors == 0 {
            anyhow::bail!("training.knn_neighbors must be at least 1");
        }
        if self.training.max_samples_per_label == 0 {
            anyhow::bail!("training.max_samples_per_label must be at least 1");
        }
        if self.training.svm.c <= 0.0 {
            anyhow::bail!("training.svm.c must be positive");
        }
        if self.training.svm.tolerance <= 0.0 {
            anyhow::bail!("training.svm.tolerance must be positive");
        }
        if self.training.svm.gamma.is_some_and(|gamma| gamma <= 0.0) {
            anyhow::bail!("training.svm.gamma must be positive");
        }
        Ok(())
    }
}
