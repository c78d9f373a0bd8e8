//! Image normalisation: uploaded bytes → RGB PNG, optionally base64-wrapped.
//!
//! Uploads arrive as whatever the phone or scanner produced (JPEG, HEIC
//! converted to JPEG, PNG with alpha, palette GIFs). OCR engines behave best
//! on plain RGB, so every upload is decoded, flattened to RGB8 and
//! re-encoded losslessly as PNG before it reaches an engine. PNG keeps text
//! edges crisp; a second JPEG pass would add artefacts right where the
//! recogniser looks.

use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// An upload that decoded successfully, re-encoded as RGB PNG.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` and re-encode as an RGB PNG.
///
/// CPU-bound; callers on the async runtime should wrap it in
/// `spawn_blocking`.
pub fn normalize_image(bytes: &[u8]) -> Result<NormalizedImage, OcrError> {
    let img = image::load_from_memory(bytes).map_err(|e| OcrError::Decode {
        detail: e.to_string(),
    })?;
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut png = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| OcrError::Decode {
            detail: format!("PNG re-encode failed: {e}"),
        })?;

    debug!(
        "Normalised image {}x{} → {} bytes PNG",
        rgb.width(),
        rgb.height(),
        png.len()
    );

    Ok(NormalizedImage {
        png,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Wrap a normalised image for a vision model request.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// reading a single 512 px overview, which loses small handwriting.
pub fn to_image_data(image: &NormalizedImage) -> ImageData {
    let b64 = STANDARD.encode(&image.png);
    debug!("Encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn rgba_png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 128])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn normalizes_rgba_to_rgb_png() {
        let out = normalize_image(&rgba_png(10, 7)).expect("decode should succeed");
        assert_eq!((out.width, out.height), (10, 7));
        assert_eq!(&out.png[..4], b"\x89PNG");

        let decoded = image::load_from_memory(&out.png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = normalize_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, OcrError::Decode { .. }));
    }

    #[test]
    fn image_data_is_base64_png() {
        let norm = normalize_image(&rgba_png(4, 4)).unwrap();
        let data = to_image_data(&norm);
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, norm.png);
    }
}
