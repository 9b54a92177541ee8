use crate::pipeline::{PipelineData, PipelineStep, PipelineContext, MetadataValue};
use crate::detection::{preprocessing, HandLocalizer};
use crate::error::Result;
use image::imageops::FilterType;
use image::DynamicImage;

/// Crop each image to its most likely hand region
pub struct HandLocalizationStep {
    pub localizer: HandLocalizer,
}

impl PipelineStep for HandLocalizationStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len());
        for item in data {
            let located = self.localizer.localize(&item.image);
            let mut new_item = item
                .with_image(located.image)
                .with_metadata("hand_found", MetadataValue::Bool(located.region.is_some()))
                .with_metadata("hand_area", MetadataValue::Int(located.area as i64));
            if located.region.is_some() {
                new_item.bbox = located.region;
            }
            result.push(new_item);
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Hand Localization"
    }
}

/// Convert image to grayscale
pub struct GrayscaleStep;

impl PipelineStep for GrayscaleStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let gray = preprocessing::to_grayscale(&item.image);
                item.with_image(DynamicImage::ImageLuma8(gray))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Grayscale Conversion"
    }
}

/// Keep the central `ratio` of width and height, dropping localizer padding
pub struct CenterCropStep {
    pub ratio: f32,
}

impl PipelineStep for CenterCropStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        let mut result = Vec::with_capacity(data.len());
        for item in data {
            let (width, height) = (item.image.width(), item.image.height());
            let crop_w = ((width as f32 * self.ratio).round() as u32).clamp(1, width.max(1));
            let crop_h = ((height as f32 * self.ratio).round() as u32).clamp(1, height.max(1));
            let x = (width.saturating_sub(crop_w)) / 2;
            let y = (height.saturating_sub(crop_h)) / 2;

            let cropped = item.image.crop_imm(x, y, crop_w, crop_h);
            result.push(item.with_image(cropped));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "Center Crop"
    }
}

/// Resize to an exact target resolution
pub struct ResizeStep {
    pub width: u32,
    pub height: u32,
}

impl PipelineStep for ResizeStep {
    fn process(&self, data: Vec<PipelineData>, _context: &PipelineContext) -> Result<Vec<PipelineData>> {
        Ok(data
            .into_iter()
            .map(|item| {
                let resized = item.image.resize_exact(self.width, self.height, FilterType::Triangle);
                item.with_image(resized)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "Resize"
    }
}
