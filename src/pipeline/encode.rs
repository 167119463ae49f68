//! Image encoding: saved crop → base64 PNG wrapped in `ImageData`.
//!
//! Vision APIs take images as base64 inside the JSON request. Crops are cut
//! from full-resolution page rasters, so a full-page figure can be several
//! thousand pixels wide; anything over [`MAX_VISION_EDGE`] is scaled down
//! before encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Longest edge sent to a vision model, in pixels.
pub const MAX_VISION_EDGE: u32 = 2048;

/// Decode a saved crop and encode it for a vision request.
///
/// ## Why PNG?
/// Lossless compression keeps labels, axis ticks and thin lines crisp; JPEG
/// artefacts on rendered text confuse vision models.
///
/// ## Why `detail: "high"`?
/// Without it GPT-4-class models look at a single low-resolution tile and
/// miss small annotations.
pub fn encode_crop(bytes: &[u8]) -> Result<ImageData, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    encode_image(&fit_to_edge(img, MAX_VISION_EDGE))
}

/// Encode an image as a base64 PNG.
pub fn encode_image(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Scale down so neither edge exceeds `max_edge`, keeping the aspect ratio.
fn fit_to_edge(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_edge {
        img
    } else {
        img.resize(max_edge, max_edge, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn encode_small_crop() {
        let data = encode_crop(&png(10, 10)).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!(img.dimensions(), (10, 10));
    }

    #[test]
    fn large_crops_are_scaled_down() {
        let data = encode_crop(&png(4096, 1024)).unwrap();
        let decoded = STANDARD.decode(&data.data).unwrap();
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!(img.dimensions(), (2048, 512));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(encode_crop(b"not an image").is_err());
    }
}
