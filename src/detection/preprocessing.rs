use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;

use crate::config::LocalizerConfig;

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Apply Gaussian blur to reduce noise
pub fn apply_blur(img: &GrayImage, sigma: f32) -> GrayImage {
    gaussian_blur_f32(img, sigma)
}

/// Full-range BT.601 conversion to (Y, Cr, Cb).
pub fn rgb_to_ycrcb(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cr = (r - y) * 0.713 + 128.0;
    let cb = (b - y) * 0.564 + 128.0;
    (clamp_u8(y), clamp_u8(cr), clamp_u8(cb))
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Binary mask (255 = skin) of pixels whose chroma falls in the skin range.
pub fn skin_mask(img: &DynamicImage, params: &LocalizerConfig) -> GrayImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let (_, cr, cb) = rgb_to_ycrcb(r, g, b);
        let is_skin = (params.cr_min..=params.cr_max).contains(&cr)
            && (params.cb_min..=params.cb_max).contains(&cb);
        Luma([if is_skin { 255 } else { 0 }])
    })
}

/// Suppress speckle: blur and re-binarize, then a morphological opening.
pub fn smooth_mask(mask: &GrayImage, sigma: f32, open_radius: u8) -> GrayImage {
    let mut smoothed = if sigma > 0.0 {
        apply_blur(mask, sigma)
    } else {
        mask.clone()
    };
    for pixel in smoothed.pixels_mut() {
        pixel.0[0] = if pixel.0[0] >= 128 { 255 } else { 0 };
    }

    if open_radius > 0 {
        open(&smoothed, Norm::LInf, open_radius)
    } else {
        smoothed
    }
}
