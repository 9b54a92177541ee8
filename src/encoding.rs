//! Conversion of raw samples into fixed-length feature vectors.
//!
//! The two families never mix: images go through the localization pipeline
//! and become `width * height` grayscale intensities, landmark sets become
//! 63 interleaved coordinates.

use std::path::PathBuf;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};

use crate::config::{EncoderConfig, LocalizerConfig};
use crate::detection::HandLocalizer;
use crate::detection::steps::{CenterCropStep, GrayscaleStep, HandLocalizationStep, ResizeStep};
use crate::error::{GestureError, Result};
use crate::landmarks::{LANDMARK_FEATURE_LEN, LandmarkSet};
use crate::models::{Family, FeatureVector};
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct FeatureEncoder {
    params: EncoderConfig,
    pipeline: Pipeline,
}

impl FeatureEncoder {
    pub fn new(localizer: LocalizerConfig, params: EncoderConfig) -> Self {
        let pipeline = build_image_pipeline(HandLocalizer::new(localizer), &params);
        Self { params, pipeline }
    }

    /// Same encoder, but every intermediate image is written below `dir`.
    pub fn with_debug(mut self, dir: PathBuf) -> Result<Self> {
        self.pipeline = self.pipeline.with_debug(dir)?;
        Ok(self)
    }

    /// Vector length produced for `family`.
    pub fn feature_len(&self, family: Family) -> usize {
        match family {
            Family::Pixel => self.params.feature_len(),
            Family::Landmark => LANDMARK_FEATURE_LEN,
        }
    }

    /// Localize, grayscale, center-crop, resize and flatten row-major into
    /// intensities in `[0, 1]`.
    pub fn encode_image(&self, img: &DynamicImage) -> Result<FeatureVector> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(GestureError::InvalidPayload(format!(
                "image has degenerate size {width}x{height}"
            )));
        }

        let mut outputs = self.pipeline.run(img.clone())?;
        let Some(item) = outputs.pop() else {
            return Err(GestureError::InvalidPayload(
                "encoding pipeline produced no image".to_string(),
            ));
        };

        let gray = item.image.to_luma8();
        let values: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        debug_assert_eq!(values.len(), self.params.feature_len());

        Ok(FeatureVector::new(Family::Pixel, values))
    }

    /// Interleave `(x, y, z)` of every point in input order.
    pub fn encode_landmarks(&self, landmarks: &LandmarkSet) -> FeatureVector {
        let values = landmarks
            .points()
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect();
        FeatureVector::new(Family::Landmark, values)
    }

    /// Validate raw JSON landmarks, then encode them.
    pub fn encode_landmarks_json(&self, value: &serde_json::Value) -> Result<FeatureVector> {
        let landmarks = LandmarkSet::from_json(value)?;
        Ok(self.encode_landmarks(&landmarks))
    }
}

fn build_image_pipeline(localizer: HandLocalizer, params: &EncoderConfig) -> Pipeline {
    Pipeline::new()
        .add_step(Arc::new(HandLocalizationStep { localizer }))
        .add_step(Arc::new(GrayscaleStep))
        .add_step(Arc::new(CenterCropStep {
            ratio: params.center_crop,
        }))
        .add_step(Arc::new(ResizeStep {
            width: params.width,
            height: params.height,
        }))
}
