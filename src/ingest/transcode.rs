//! Photo preparation before upload
//!
//! Photos larger than the configured box are decoded once, turned upright
//! from their EXIF orientation, resized to fit it with Lanczos3 and
//! re-encoded as JPEG. Everything else is uploaded as
//! picked, including formats the decoder does not understand.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader, ImageResult};

use crate::error::IngestError;

use super::IngestLimits;

/// Payload ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
    /// Whether the photo was downscaled
    pub resized: bool,
}

/// Downscale `bytes` off the async runtime if it exceeds the limits
pub async fn prepare_photo(
    file_name: &str,
    content_type: &str,
    bytes: Vec<u8>,
    limits: &IngestLimits,
) -> Result<Prepared, IngestError> {
    let name = file_name.to_string();
    let ct = content_type.to_string();
    let limits = limits.clone();

    tokio::task::spawn_blocking(move || downscale(name, ct, bytes, &limits))
        .await
        .map_err(|e| IngestError::Transcode {
            file: file_name.to_string(),
            reason: e.to_string(),
        })
}

fn downscale(file_name: String, content_type: String, bytes: Vec<u8>, limits: &IngestLimits) -> Prepared {
    let original = |bytes| Prepared {
        bytes,
        content_type: content_type.clone(),
        file_name: file_name.clone(),
        resized: false,
    };

    let img = match decode_upright(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(file = %file_name, error = %e, "cannot decode photo, uploading as is");
            return original(bytes);
        }
    };

    let (width, height) = img.dimensions();
    if width <= limits.max_width && height <= limits.max_height {
        return original(bytes);
    }

    // Fits within the box, keeping aspect ratio
    let resized = img.resize(limits.max_width, limits.max_height, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, limits.jpeg_quality);
    if let Err(e) = encoder.encode_image(&rgb) {
        tracing::warn!(file = %file_name, error = %e, "re-encode failed, uploading original");
        return original(bytes);
    }

    tracing::info!(
        file = %file_name,
        from = %format!("{width}x{height}"),
        to = %format!("{}x{}", rgb.width(), rgb.height()),
        kb = out.len() / 1024,
        "downscaled photo"
    );

    Prepared {
        bytes: out,
        content_type: "image/jpeg".to_string(),
        file_name: with_jpeg_extension(&file_name),
        resized: true,
    }
}

/// Decode and apply the EXIF orientation, since the re-encoded JPEG carries
/// no metadata
fn decode_upright(bytes: &[u8]) -> ImageResult<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder)?;
    img.apply_orientation(orientation);
    Ok(img)
}

fn with_jpeg_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            if ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg") {
                name.to_string()
            } else {
                format!("{stem}.jpg")
            }
        }
        _ => format!("{name}.jpg"),
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 60]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
