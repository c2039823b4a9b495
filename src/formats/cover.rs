//! Cover image resolution and re-encoding.

use crate::error::{AppError, Result};
use crate::layout::CoverImage;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

/// JPEG quality used when re-encoding covers.
pub const COVER_QUALITY: u8 = 90;

/// URL prefix under which uploaded covers are served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Decode any supported image and re-encode it as a baseline RGB JPEG.
///
/// Pixel dimensions are kept; fitting happens at render time.
pub fn encode_cover(data: &[u8]) -> Result<CoverImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| AppError::Internal(format!("Failed to read image: {}", e)))?
        .decode()?;

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, COVER_QUALITY).encode_image(&rgb)?;

    Ok(CoverImage {
        jpeg,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Resolve a book's cover reference to an embeddable image.
///
/// Returns `None` when there is no reference, when it names a placeholder
/// avatar or a remote URL, or when the file is missing or unreadable. None of
/// these stop an export.
pub fn load_cover(
    reference: Option<&str>,
    uploads_dir: &Path,
    placeholder_markers: &[String],
) -> Option<CoverImage> {
    let reference = reference.map(str::trim).filter(|r| !r.is_empty())?;

    if placeholder_markers
        .iter()
        .any(|marker| !marker.is_empty() && reference.contains(marker.as_str()))
    {
        tracing::debug!(reference, "Skipping placeholder cover");
        return None;
    }

    if reference.starts_with("http://") || reference.starts_with("https://") {
        tracing::debug!(reference, "Skipping remote cover");
        return None;
    }

    // Only the file name is honored, so references cannot leave the uploads dir.
    let relative = reference.strip_prefix(UPLOADS_PREFIX).unwrap_or(reference);
    let file_name = Path::new(relative).file_name()?;
    let path = uploads_dir.join(file_name);

    if !path.is_file() {
        let err = AppError::AssetMissing(path);
        tracing::warn!(error = %err, "Exporting without cover");
        return None;
    }

    let loaded = std::fs::read(&path)
        .map_err(AppError::from)
        .and_then(|data| encode_cover(&data));

    match loaded {
        Ok(cover) => Some(cover),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable cover image");
            None
        }
    }
}
