//! Integration tests for hand localization and feature encoding.
//!
//! Tests cover:
//! - Fallback to the untouched image when no skin is present
//! - Cropping to the padded skin region
//! - Pixel vectors: length, value range, determinism
//! - Landmark vectors: validation and coordinate order
//! - Pipeline step metadata and debug image output

mod common;

use common::*;
use handsign::config::{EncoderConfig, LocalizerConfig};
use handsign::landmarks::LANDMARK_FEATURE_LEN;
use image::GenericImageView;

fn default_encoder() -> FeatureEncoder {
    FeatureEncoder::new(LocalizerConfig::default(), EncoderConfig::default())
}

#[test]
fn test_no_skin_keeps_image() -> anyhow::Result<()> {
    let img = blank_image(120, 80);
    let localizer = HandLocalizer::default();

    let result = localizer.localize(&img);

    assert!(result.region.is_none());
    assert_eq!(result.image.dimensions(), (120, 80));
    assert_eq!(result.image.to_rgb8(), img.to_rgb8());

    Ok(())
}

#[test]
fn test_crops_to_skin_region() -> anyhow::Result<()> {
    let img = skin_square(40, 50, 20);
    let localizer = HandLocalizer::default();

    let result = localizer.localize(&img);
    let region = result.region.expect("skin square should be found");

    // Padded box must contain the square and stay smaller than the canvas
    assert!(region.x <= 50 && region.y <= 20);
    assert!(region.x + region.width >= 90);
    assert!(region.y + region.height >= 60);
    assert!(region.width < CANVAS || region.height < CANVAS);
    assert_eq!(result.image.dimensions(), (region.width, region.height));
    assert!(result.area >= 30 * 30);

    Ok(())
}

#[test]
fn test_largest_region_wins() -> anyhow::Result<()> {
    let mut img = skin_square(44, 48, 40).to_rgb8();
    // Small blob in the top-left corner
    for y in 4..16 {
        for x in 4..16 {
            img.put_pixel(x, y, SKIN);
        }
    }
    let localizer = HandLocalizer::default();

    let hand = localizer
        .find_hand(&image::DynamicImage::ImageRgb8(img))
        .expect("a region should be found");

    assert!(hand.min_x >= 40);
    assert!(hand.min_y >= 32);

    Ok(())
}

#[test]
fn test_pixel_vector_shape_and_range() -> anyhow::Result<()> {
    let encoder = default_encoder();

    for img in [skin_square(40, 20, 20), skin_ring(44, 30, 10), blank_image(64, 48)] {
        let vector = encoder.encode_image(&img)?;
        assert_eq!(vector.family(), Family::Pixel);
        assert_eq!(vector.len(), 32 * 32);
        assert_eq!(vector.len(), encoder.feature_len(Family::Pixel));
        assert!(vector.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    Ok(())
}

#[test]
fn test_pixel_vector_is_deterministic() -> anyhow::Result<()> {
    let encoder = default_encoder();
    let img = skin_ring(40, 25, 30);

    let first = encoder.encode_image(&img)?;
    let second = encoder.encode_image(&img)?;

    assert_eq!(first, second);

    Ok(())
}

#[test]
fn test_square_and_ring_encode_differently() -> anyhow::Result<()> {
    let encoder = default_encoder();

    let square = encoder.encode_image(&skin_square(40, 20, 20))?;
    let ring = encoder.encode_image(&skin_ring(40, 20, 20))?;

    // Center pixel: skin for the square, hole for the ring
    let center = 16 * 32 + 16;
    assert!(square.as_slice()[center] > 0.5);
    assert!(ring.as_slice()[center] < 0.3);

    Ok(())
}

#[test]
fn test_degenerate_image_rejected() -> anyhow::Result<()> {
    let encoder = default_encoder();
    let empty = image::DynamicImage::new_rgb8(0, 0);

    let err = encoder.encode_image(&empty).unwrap_err();
    assert!(err.is_validation());

    Ok(())
}

#[test]
fn test_landmark_vector_order() -> anyhow::Result<()> {
    let encoder = default_encoder();
    let points: Vec<serde_json::Value> = (0..21)
        .map(|i| serde_json::json!({ "x": i as f32, "y": i as f32 + 0.5, "z": -(i as f32) }))
        .collect();
    let landmarks = LandmarkSet::from_json(&serde_json::Value::Array(points))?;

    let vector = encoder.encode_landmarks(&landmarks);

    assert_eq!(vector.family(), Family::Landmark);
    assert_eq!(vector.len(), LANDMARK_FEATURE_LEN);
    for i in 0..21 {
        assert_eq!(vector.as_slice()[3 * i], i as f32);
        assert_eq!(vector.as_slice()[3 * i + 1], i as f32 + 0.5);
        assert_eq!(vector.as_slice()[3 * i + 2], -(i as f32));
    }

    Ok(())
}

#[test]
fn test_landmark_count_validated() -> anyhow::Result<()> {
    let encoder = default_encoder();

    for count in [0, 20, 22] {
        let err = encoder
            .encode_landmarks_json(&landmarks_with_count(count))
            .unwrap_err();
        assert!(matches!(err, GestureError::InvalidLandmarks(_)), "count {count}: {err}");
    }
    assert!(encoder.encode_landmarks_json(&landmarks_with_count(21)).is_ok());

    Ok(())
}

#[test]
fn test_landmark_missing_coordinate() -> anyhow::Result<()> {
    let mut value = hand_landmarks(0.5, 0);
    value["landmarks"][7]
        .as_object_mut()
        .expect("point is an object")
        .remove("x");

    let err = LandmarkSet::from_json(&value).unwrap_err();
    assert!(matches!(err, GestureError::InvalidLandmarks(_)));

    // A missing z is fine
    value["landmarks"][7]["x"] = serde_json::json!(0.5);
    value["landmarks"][7]
        .as_object_mut()
        .expect("point is an object")
        .remove("z");
    let landmarks = LandmarkSet::from_json(&value)?;
    assert_eq!(landmarks.points()[7].z, 0.0);

    Ok(())
}

#[test]
fn test_pipeline_records_hand_metadata() -> anyhow::Result<()> {
    use handsign::detection::steps::HandLocalizationStep;
    use handsign::Pipeline;
    use std::sync::Arc;

    let pipeline = Pipeline::new().add_step(Arc::new(HandLocalizationStep {
        localizer: HandLocalizer::default(),
    }));
    assert_eq!(pipeline.step_names(), vec!["Hand Localization"]);

    let found = pipeline.run(skin_square(40, 30, 30))?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_bool("hand_found"), Some(true));
    assert!(found[0].get_int("hand_area").unwrap_or(0) > 0);
    assert!(found[0].bbox.is_some());

    let missing = pipeline.run(blank_image(64, 64))?;
    assert_eq!(missing[0].get_bool("hand_found"), Some(false));
    assert!(missing[0].bbox.is_none());

    Ok(())
}

#[test]
fn test_debug_output_written_per_step() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let out = dir.path().join("debug");
    let encoder = default_encoder().with_debug(out.clone())?;

    encoder.encode_image(&skin_square(40, 20, 20))?;

    assert!(out.join("00_input/01.png").is_file());
    assert!(out.join("01_hand_localization/01.png").is_file());
    assert!(out.join("02_grayscale_conversion/01.png").is_file());
    assert!(out.join("03_center_crop/01.png").is_file());
    let resized = image::open(out.join("04_resize/01.png"))?;
    assert_eq!(resized.dimensions(), (32, 32));

    // A non-empty directory is refused
    assert!(default_encoder().with_debug(out).is_err());

    Ok(())
}
