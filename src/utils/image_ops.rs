use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::core::errors::{DecodeError, DecodeResult};

/// Decode raw upload bytes into an image.
///
/// Runs before the recognition pipeline; the pipeline never sees undecodable input.
pub fn decode_image(bytes: &[u8]) -> DecodeResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Asynchronously decode an image using spawn_blocking.
///
/// Image decoding is CPU-intensive, especially for large phone photos.
pub async fn decode_image_async(bytes: Vec<u8>) -> DecodeResult<DynamicImage> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| DecodeError::TaskJoinFailed(e.to_string()))?
}

/// Read and decode an image file from disk
pub fn load_image_file(path: &Path) -> DecodeResult<DynamicImage> {
    let bytes = std::fs::read(path).map_err(|e| {
        DecodeError::Invalid(image::ImageError::IoError(e))
    })?;
    decode_image(&bytes)
}

/// Whether a path looks like an image the decoder supports
pub fn has_image_extension(path: &Path) -> bool {
    ImageFormat::from_path(path)
        .map(|format| format.reading_enabled())
        .unwrap_or(false)
}

/// Encode an image as PNG bytes
pub fn encode_png(image: &DynamicImage) -> DecodeResult<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}
