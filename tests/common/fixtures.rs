use std::io::Cursor;
use std::path::Path;

use handsign::{Config, GestureService, UploadSample};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Falls inside the default YCrCb skin range.
pub const SKIN: Rgb<u8> = Rgb([224, 172, 140]);
/// Dark blue, well outside the skin range.
pub const BACKGROUND: Rgb<u8> = Rgb([20, 20, 60]);

/// Image side used by the synthetic hand images.
pub const CANVAS: u32 = 96;

/// A solid skin square of `side` pixels at `(x, y)` on a dark canvas.
pub fn skin_square(side: u32, x: u32, y: u32) -> DynamicImage {
    canvas_with(|px, py| inside(px, py, x, y, side))
}

/// A skin square frame whose dark hole is half its side.
pub fn skin_ring(side: u32, x: u32, y: u32) -> DynamicImage {
    let hole = side / 2;
    let hole_x = x + (side - hole) / 2;
    let hole_y = y + (side - hole) / 2;
    canvas_with(|px, py| inside(px, py, x, y, side) && !inside(px, py, hole_x, hole_y, hole))
}

/// Canvas with no skin at all.
pub fn blank_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, BACKGROUND))
}

fn canvas_with(is_skin: impl Fn(u32, u32) -> bool) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(CANVAS, CANVAS, |px, py| {
        if is_skin(px, py) { SKIN } else { BACKGROUND }
    });
    DynamicImage::ImageRgb8(img)
}

fn inside(px: u32, py: u32, x: u32, y: u32, side: u32) -> bool {
    px >= x && px < x + side && py >= y && py < y + side
}

/// PNG-encoded bytes of `img`.
pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test image");
    out.into_inner()
}

/// Square sizes and offsets for the `n`-th synthetic sample.
pub fn variant(n: u32) -> (u32, u32, u32) {
    let side = 30 + (n * 5) % 21;
    let x = 8 + (n * 7) % (CANVAS - side - 16);
    let y = 10 + (n * 11) % (CANVAS - side - 20);
    (side, x, y)
}

/// 21 landmark points spread around `center`, nudged by `seed`.
pub fn hand_landmarks(center: f32, seed: u32) -> Value {
    let jitter = (seed % 5) as f32 * 0.002;
    let points: Vec<Value> = (0..21)
        .map(|i| {
            let offset = i as f32 * 0.005;
            json!({
                "x": center + offset + jitter,
                "y": center - offset + jitter,
                "z": -0.01 * i as f32,
            })
        })
        .collect();
    json!({ "landmarks": points })
}

/// Same shape as [`hand_landmarks`] but with `count` points.
pub fn landmarks_with_count(count: usize) -> Value {
    let points: Vec<Value> = (0..count)
        .map(|i| json!([i as f32 * 0.01, 0.5, 0.0]))
        .collect();
    Value::Array(points)
}

/// Config rooted in `dir`, with default labels and parameters.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.dataset_dir = dir.join("dataset");
    config.storage.model_dir = dir.join("models");
    config
}

/// Creates a service over a temporary directory.
/// Returns both the service and the temp directory (which must be kept alive).
pub fn create_test_service() -> (GestureService, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let service = GestureService::open(test_config(dir.path())).expect("Failed to open service");
    (service, dir)
}

/// Upload `count` square images for `label`, starting at variant `first`.
pub fn upload_squares(service: &GestureService, label: &str, first: u32, count: u32) -> anyhow::Result<()> {
    for n in first..first + count {
        let (side, x, y) = variant(n);
        service.upload(label, UploadSample::Image(png_bytes(&skin_square(side, x, y))))?;
    }
    Ok(())
}

/// Upload `count` ring images for `label`, starting at variant `first`.
pub fn upload_rings(service: &GestureService, label: &str, first: u32, count: u32) -> anyhow::Result<()> {
    for n in first..first + count {
        let (side, x, y) = variant(n);
        service.upload(label, UploadSample::Image(png_bytes(&skin_ring(side, x, y))))?;
    }
    Ok(())
}

/// Upload `count` landmark samples around `center` for `label`.
pub fn upload_landmarks(service: &GestureService, label: &str, center: f32, count: u32) -> anyhow::Result<()> {
    for seed in 0..count {
        service.upload(label, UploadSample::Landmarks(hand_landmarks(center, seed)))?;
    }
    Ok(())
}
