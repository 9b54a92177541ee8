//! Integration tests for sample upload, storage and aggregation.
//!
//! Tests cover:
//! - Label validation and payload decoding on upload
//! - Storage layout for image and landmark samples
//! - Aggregation skipping corrupt samples and honoring the per-label cap
//! - The status report

mod common;

use std::fs;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::*;
use handsign::config::{EncoderConfig, LocalizerConfig};

fn label(symbol: &str) -> Label {
    handsign::LabelSet::new([symbol])
        .and_then(|set| set.parse(symbol))
        .expect("valid label")
}

fn encoder() -> FeatureEncoder {
    FeatureEncoder::new(LocalizerConfig::default(), EncoderConfig::default())
}

#[test]
fn test_upload_image_layout() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();

    let first = service.upload("a", UploadSample::Image(png_bytes(&skin_square(40, 10, 10))))?;
    let second = service.upload("A", UploadSample::Image(png_bytes(&skin_square(36, 20, 12))))?;

    assert_eq!(first.label.as_str(), "A");
    assert_eq!(first.family, Family::Pixel);
    assert!(first.saved.ends_with("images/A/A_00000.png"));
    assert!(second.saved.ends_with("images/A/A_00001.png"));
    assert!(first.saved.is_file() && second.saved.is_file());

    Ok(())
}

#[test]
fn test_upload_base64_data_url() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    let encoded = format!(
        "data:image/png;base64,{}",
        STANDARD.encode(png_bytes(&skin_ring(40, 10, 10)))
    );

    let receipt = service.upload("B", UploadSample::ImageBase64(encoded))?;

    assert_eq!(receipt.family, Family::Pixel);
    assert!(receipt.saved.ends_with("images/B/B_00000.png"));
    assert!(image::open(&receipt.saved).is_ok());

    Ok(())
}

#[test]
fn test_upload_rejects_unknown_label() -> anyhow::Result<()> {
    let (service, temp_dir) = create_test_service();
    let bytes = png_bytes(&skin_square(40, 10, 10));

    for bad in ["1", "AB", "", "../A", "NO_MODEL"] {
        let err = service.upload(bad, UploadSample::Image(bytes.clone())).unwrap_err();
        assert!(matches!(err, GestureError::InvalidLabel { .. }), "{bad:?}: {err}");
    }
    assert!(!temp_dir.path().join("dataset").exists());

    Ok(())
}

#[test]
fn test_upload_rejects_bad_payloads() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();

    let err = service
        .upload("A", UploadSample::ImageBase64("!!! not base64 !!!".to_string()))
        .unwrap_err();
    assert!(matches!(err, GestureError::InvalidPayload(_)));

    let err = service
        .upload("A", UploadSample::Image(b"definitely not an image".to_vec()))
        .unwrap_err();
    assert!(matches!(err, GestureError::InvalidPayload(_)));

    let err = service
        .upload("A", UploadSample::Landmarks(landmarks_with_count(20)))
        .unwrap_err();
    assert!(matches!(err, GestureError::InvalidLandmarks(_)));

    assert_eq!(service.status().dataset.total(), 0);

    Ok(())
}

#[test]
fn test_upload_landmarks_appends_records() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();

    upload_landmarks(&service, "C", 0.4, 3)?;

    let path = service.store().location(&label("C"), Family::Landmark);
    assert!(path.ends_with("landmarks/C.jsonl"));
    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);

    let record: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(record["label"], "C");
    assert_eq!(record["points"].as_array().map(Vec::len), Some(21));
    assert!(record["recorded_at"].is_string());

    Ok(())
}

#[test]
fn test_aggregation_skips_corrupt_images() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    upload_squares(&service, "A", 0, 3)?;

    let dir = service.store().location(&label("A"), Family::Pixel);
    fs::write(dir.join("A_00003.png"), b"truncated")?;
    fs::write(dir.join("A_00004.jpg"), [0xFF, 0xD8, 0xFF, 0x00])?;
    fs::write(dir.join("notes.txt"), b"ignored entirely")?;

    let encoder = encoder();
    let a = label("A");
    let set = Aggregator::new(service.store(), &encoder, 500).load([&a], Family::Pixel);

    assert_eq!(set.len(), 3);
    assert_eq!(set.skipped, 2);
    assert_eq!(set.counts.get(&a), Some(&3));
    assert!(set.samples.iter().all(|(v, l)| l == &a && v.len() == 32 * 32));

    Ok(())
}

#[test]
fn test_aggregation_skips_corrupt_landmark_lines() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    upload_landmarks(&service, "B", 0.6, 2)?;

    let path = service.store().location(&label("B"), Family::Landmark);
    let mut text = fs::read_to_string(&path)?;
    text.push_str("{not json\n");
    text.push_str("{\"label\":\"B\",\"points\":[[0.1,0.2,0.0]]}\n");
    text.push_str("{\"label\":\"Z\",\"points\":[]}\n");
    fs::write(&path, text)?;

    let encoder = encoder();
    let b = label("B");
    let set = Aggregator::new(service.store(), &encoder, 500).load([&b], Family::Landmark);

    assert_eq!(set.len(), 2);
    assert_eq!(set.skipped, 3);

    Ok(())
}

#[test]
fn test_invalid_utf8_line_skips_only_that_line() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    upload_landmarks(&service, "B", 0.6, 3)?;

    let path = service.store().location(&label("B"), Family::Landmark);
    let mut bytes = fs::read(&path)?;
    bytes.extend_from_slice(&[0xFF, 0xFE, b'\n']);
    fs::write(&path, bytes)?;

    let encoder = encoder();
    let b = label("B");
    let set = Aggregator::new(service.store(), &encoder, 500).load([&b], Family::Landmark);

    assert_eq!(set.len(), 3);
    assert_eq!(set.skipped, 1);
    assert_eq!(set.counts.get(&b), Some(&3));

    // Status counts stored lines, decodable or not
    let status = service.status();
    assert_eq!(status.dataset.per_label[&b].landmarks, 4);

    Ok(())
}

#[test]
fn test_aggregation_caps_per_label() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    upload_landmarks(&service, "A", 0.2, 5)?;
    upload_landmarks(&service, "B", 0.8, 1)?;

    let encoder = encoder();
    let (a, b, c) = (label("A"), label("B"), label("C"));
    let set = Aggregator::new(service.store(), &encoder, 2).load([&a, &b, &c], Family::Landmark);

    assert_eq!(set.len(), 3);
    assert_eq!(set.counts.get(&a), Some(&2));
    assert_eq!(set.counts.get(&b), Some(&1));
    assert_eq!(set.counts.get(&c), Some(&0));
    assert_eq!(set.present_labels(), vec![a, b]);

    Ok(())
}

#[test]
fn test_status_report() -> anyhow::Result<()> {
    let (service, _temp_dir) = create_test_service();
    upload_squares(&service, "A", 0, 2)?;
    upload_landmarks(&service, "B", 0.5, 1)?;

    let status = service.status();

    assert_eq!(status.labels.len(), 26);
    assert_eq!(status.dataset.total_images, 2);
    assert_eq!(status.dataset.total_landmarks, 1);
    assert_eq!(status.dataset.per_label[&label("A")].images, 2);
    assert_eq!(status.dataset.per_label[&label("B")].landmarks, 1);
    for family in Family::ALL {
        let model = &status.models[&family];
        assert!(!model.resident);
        assert!(!model.artifact_exists);
    }

    // The report is what the CLI prints
    let json = serde_json::to_value(&status)?;
    assert_eq!(json["models"]["pixel"]["resident"], false);

    Ok(())
}
