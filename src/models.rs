use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::pipeline::BoundingBox;

/// Label reported when no classifier is available for a family.
pub const NO_MODEL_LABEL: &str = "NO_MODEL";

/// Connected region of a binary mask.
#[derive(Debug, Clone)]
pub struct Contour {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Contour {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Number of mask pixels enclosed by the region.
    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    /// Bounding box grown by `ratio` of the larger side, clipped to the image.
    pub fn padded_bounds(&self, ratio: f32, img_width: u32, img_height: u32) -> BoundingBox {
        let padding = (self.width().max(self.height()) as f32 * ratio).round() as u32;

        let x = self.min_x.saturating_sub(padding);
        let y = self.min_y.saturating_sub(padding);
        let max_x = self.max_x.saturating_add(padding).min(img_width.saturating_sub(1));
        let max_y = self.max_y.saturating_add(padding).min(img_height.saturating_sub(1));

        BoundingBox {
            x,
            y,
            width: max_x - x + 1,
            height: max_y - y + 1,
        }
    }
}

/// One of the two independent feature representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Pixel,
    Landmark,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::Pixel, Family::Landmark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Pixel => "pixel",
            Family::Landmark => "landmark",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = GestureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pixel" | "image" => Ok(Family::Pixel),
            "landmark" | "landmarks" => Ok(Family::Landmark),
            other => Err(GestureError::InvalidPayload(format!(
                "unknown feature family {other:?}"
            ))),
        }
    }
}

/// A class symbol drawn from the configured label set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_no_model(&self) -> bool {
        self.0 == NO_MODEL_LABEL
    }

    pub(crate) fn no_model() -> Self {
        Label(NO_MODEL_LABEL.to_string())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Finite, ordered set of labels accepted for upload and training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<Label>,
}

impl LabelSet {
    /// Build a set from raw symbols. Symbols are trimmed and upper-cased.
    pub fn new<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels: Vec<Label> = Vec::new();
        for symbol in raw {
            let label = normalize(symbol.as_ref())?;
            if label.is_no_model() {
                return Err(GestureError::InvalidPayload(format!(
                    "{NO_MODEL_LABEL} is reserved and cannot be a configured label"
                )));
            }
            if labels.contains(&label) {
                return Err(GestureError::InvalidPayload(format!(
                    "duplicate label {label} in configuration"
                )));
            }
            labels.push(label);
        }

        if labels.is_empty() {
            return Err(GestureError::InvalidPayload(
                "label set must not be empty".to_string(),
            ));
        }

        Ok(Self { labels })
    }

    /// Validate caller input against the set.
    pub fn parse(&self, raw: &str) -> Result<Label> {
        let invalid = || GestureError::InvalidLabel {
            label: raw.trim().to_string(),
            allowed: self.describe(),
        };
        let label = normalize(raw).map_err(|_| invalid())?;
        if self.contains(&label) {
            Ok(label)
        } else {
            Err(invalid())
        }
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn describe(&self) -> String {
        self.labels
            .iter()
            .map(Label::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Labels double as directory and file names, so only a conservative
/// character set is accepted.
fn normalize(raw: &str) -> Result<Label> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(GestureError::InvalidLabel {
            label: raw.trim().to_string(),
            allowed: "ASCII letters, digits, '_' or '-'".to_string(),
        });
    }
    Ok(Label(symbol))
}

/// Fixed-length numeric encoding of one sample, tagged with its family.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    family: Family,
    values: Vec<f32>,
}

impl FeatureVector {
    pub fn new(family: Family, values: Vec<f32>) -> Self {
        Self { family, values }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Winning label and the confidence the classifier assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: Label,
    pub confidence: f32,
}

impl PredictionResult {
    pub fn no_model() -> Self {
        Self {
            label: Label::no_model(),
            confidence: 0.0,
        }
    }

    pub fn is_no_model(&self) -> bool {
        self.label.is_no_model()
    }
}

/// Result of one training request.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub family: Family,
    pub success: bool,
    pub sample_count: usize,
    pub per_label_counts: BTreeMap<Label, usize>,
    /// Stored samples that failed to decode and were left out.
    pub skipped: usize,
    /// Version of the resident model after a successful fit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
