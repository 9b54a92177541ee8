pub mod preprocessing;
pub mod contours;
pub mod steps;

use image::{DynamicImage, GenericImageView};

use crate::config::LocalizerConfig;
use crate::models::Contour;
use crate::pipeline::BoundingBox;

/// Outcome of a localization attempt.
#[derive(Debug, Clone)]
pub struct Localization {
    pub image: DynamicImage,
    /// Crop rectangle in the input image, `None` when the input was kept whole.
    pub region: Option<BoundingBox>,
    /// Pixel count of the selected region.
    pub area: u32,
}

/// Skin-color hand localizer.
///
/// Segments skin tones in YCrCb, smooths the mask, picks the largest
/// connected region and crops to its padded bounding box. Any failure falls
/// back to the untouched input.
#[derive(Debug, Clone, Default)]
pub struct HandLocalizer {
    pub params: LocalizerConfig,
}

impl HandLocalizer {
    pub fn new(params: LocalizerConfig) -> Self {
        Self { params }
    }

    /// Crop `img` to the most likely hand region, or return it unchanged.
    pub fn locate(&self, img: &DynamicImage) -> DynamicImage {
        self.localize(img).image
    }

    pub fn localize(&self, img: &DynamicImage) -> Localization {
        let unchanged = || Localization {
            image: img.clone(),
            region: None,
            area: 0,
        };

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return unchanged();
        }

        let Some(hand) = self.find_hand(img) else {
            tracing::debug!("No skin region found in {}x{} image, using whole image", width, height);
            return unchanged();
        };

        let region = hand.padded_bounds(self.params.padding_ratio, width, height);
        if region.width == 0 || region.height == 0 {
            return unchanged();
        }

        tracing::debug!(
            "Hand region at ({}, {}) {}x{}, area {}",
            region.x, region.y, region.width, region.height, hand.area()
        );

        Localization {
            image: img.crop_imm(region.x, region.y, region.width, region.height),
            region: Some(region),
            area: hand.area(),
        }
    }

    /// Largest plausible skin region, if any.
    pub fn find_hand(&self, img: &DynamicImage) -> Option<Contour> {
        let (width, height) = img.dimensions();
        let mask = preprocessing::skin_mask(img, &self.params);
        let mask = preprocessing::smooth_mask(&mask, self.params.blur_sigma, self.params.open_radius);

        let min_area = (width as f32 * height as f32 * self.params.min_area_fraction).ceil() as u32;
        let candidates = contours::find_contours(&mask, min_area);
        tracing::debug!("Found {} skin regions of at least {} pixels", candidates.len(), min_area);

        contours::largest_contour(&candidates)
            .filter(|c| c.area() > 0)
            .cloned()
    }
}
