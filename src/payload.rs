//! Decoding of uploaded image payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat};

use crate::error::{GestureError, Result};

/// Decode base64 text, tolerating a `data:image/...;base64,` prefix and
/// embedded whitespace.
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let body = match text.split_once(',') {
        Some((_, rest)) => rest,
        None => text,
    };
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| GestureError::InvalidPayload(format!("bad base64: {e}")))
}

/// Decode raw image bytes.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes)
        .map_err(|e| GestureError::InvalidPayload(format!("undecodable image: {e}")))
}

/// Bytes and file extension to store for an upload.
///
/// PNG and JPEG are kept verbatim; any other decodable format is re-encoded
/// as PNG so the dataset only holds recognized extensions.
pub fn normalize_for_storage(bytes: &[u8]) -> Result<(Vec<u8>, &'static str)> {
    let img = decode_image(bytes)?;
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok((bytes.to_vec(), "png")),
        Ok(ImageFormat::Jpeg) => Ok((bytes.to_vec(), "jpg")),
        _ => {
            let mut out = std::io::Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Png)
                .map_err(|e| GestureError::InvalidPayload(format!("cannot re-encode image: {e}")))?;
            Ok((out.into_inner(), "png"))
        }
    }
}
