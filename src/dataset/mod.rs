//! Labeled sample storage and training-set aggregation.

pub mod aggregate;
pub mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::landmarks::LandmarkSet;
use crate::models::{Family, Label};

pub use aggregate::{Aggregator, TrainingSet};
pub use store::FsSampleStore;

/// Raster extensions considered image samples (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A stored sample, located but not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSource {
    ImageFile(PathBuf),
    LandmarkLine {
        path: PathBuf,
        /// 1-based line number in the label's record file
        line: usize,
        /// Raw line content, decoded as UTF-8 JSON during aggregation
        bytes: Vec<u8>,
    },
}

impl SampleSource {
    pub fn family(&self) -> Family {
        match self {
            SampleSource::ImageFile(_) => Family::Pixel,
            SampleSource::LandmarkLine { .. } => Family::Landmark,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SampleSource::ImageFile(path) => path.display().to_string(),
            SampleSource::LandmarkLine { path, line, .. } => format!("{}:{}", path.display(), line),
        }
    }
}

/// One line of a label's landmark record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub label: Label,
    pub points: Vec<[f32; 3]>,
    pub recorded_at: String,
}

/// A stored sample that could not be turned into a feature vector.
#[derive(Debug, Clone, thiserror::Error)]
#[error("skipped {sample}: {reason}")]
pub struct DecodeSkip {
    pub sample: String,
    pub reason: String,
}

impl DecodeSkip {
    pub fn new(sample: &SampleSource, reason: impl ToString) -> Self {
        Self {
            sample: sample.describe(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelStats {
    pub images: usize,
    pub landmarks: usize,
}

/// Read-only sample counts for the status surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetStats {
    pub per_label: BTreeMap<Label, LabelStats>,
    pub total_images: usize,
    pub total_landmarks: usize,
}

impl DatasetStats {
    pub fn total(&self) -> usize {
        self.total_images + self.total_landmarks
    }
}

/// Storage boundary for labeled samples.
///
/// Samples are append-only: the core stores and lists them but never deletes.
pub trait SampleRepository: Send + Sync {
    /// Persist an image upload, returning where it was written.
    fn store_image(&self, label: &Label, bytes: &[u8]) -> Result<PathBuf>;

    /// Append a landmark sample, returning the record file it went to.
    fn store_landmarks(&self, label: &Label, landmarks: &LandmarkSet) -> Result<PathBuf>;

    /// Every stored sample for `label` in discovery order. A label that never
    /// received samples yields an empty list.
    fn list_samples(&self, label: &Label, family: Family) -> Result<Vec<SampleSource>>;

    /// Directory (pixel) or record file (landmark) backing `label`.
    fn location(&self, label: &Label, family: Family) -> PathBuf;

    /// Root of the store, reported by the status surface.
    fn root(&self) -> PathBuf;

    fn count_samples(&self, label: &Label, family: Family) -> usize {
        self.list_samples(label, family)
            .map(|sources| sources.len())
            .unwrap_or(0)
    }

    fn stats<'a, I>(&self, labels: I) -> DatasetStats
    where
        I: IntoIterator<Item = &'a Label>,
        Self: Sized,
    {
        let mut stats = DatasetStats::default();
        for label in labels {
            let entry = LabelStats {
                images: self.count_samples(label, Family::Pixel),
                landmarks: self.count_samples(label, Family::Landmark),
            };
            stats.total_images += entry.images;
            stats.total_landmarks += entry.landmarks;
            stats.per_label.insert(label.clone(), entry);
        }
        stats
    }
}
