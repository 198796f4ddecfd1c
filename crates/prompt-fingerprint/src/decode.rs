//! Image decoding for backend response bodies.

use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::types::{FingerprintError, FingerprintResult};

/// Decode raw response bytes into an image.
///
/// The format is sniffed from the bytes. `mime` (the response
/// `Content-Type`) is only consulted when the bytes carry no recognisable
/// signature, so a mislabelled body still decodes.
pub fn decode_image(bytes: &[u8], mime: Option<&str>) -> FingerprintResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(FingerprintError::MalformedResponse(
            "empty image body".to_string(),
        ));
    }

    let img = match image::guess_format(bytes).ok().or_else(|| format_from_mime(mime)) {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt)?,
        None => image::load_from_memory(bytes)?,
    };

    Ok(img)
}

fn format_from_mime(mime: Option<&str>) -> Option<ImageFormat> {
    let essence = mime?.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Check if a file path points to a format the image can be saved as.
pub fn is_supported_format(path: &str) -> bool {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        ext.as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "bmp" | "tiff" | "tif"
    )
}
