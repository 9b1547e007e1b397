//! Image Validator.
//!
//! Confirms that a submitted byte buffer is a well-formed raster image before
//! any outbound call is made.  Validation performs a full decode of the pixel
//! data, so a file whose header parses but whose body is truncated or corrupt
//! is still rejected.

use image::ImageFormat;
use pathsense_types::PerceptionError;
use tracing::debug;

/// Largest frame accepted for analysis (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Metadata about a frame that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Decode `bytes` fully and return basic image metadata.
///
/// # Errors
///
/// Returns [`PerceptionError::InvalidImage`] when the buffer is empty, larger
/// than [`MAX_IMAGE_BYTES`], of an unrecognised format, or fails to decode.
pub fn validate_image(bytes: &[u8]) -> Result<ImageInfo, PerceptionError> {
    if bytes.is_empty() {
        return Err(PerceptionError::InvalidImage("image data is empty".into()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(PerceptionError::InvalidImage(format!(
            "image is {} bytes (max {MAX_IMAGE_BYTES})",
            bytes.len()
        )));
    }

    let format =
        image::guess_format(bytes).map_err(|e| PerceptionError::InvalidImage(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PerceptionError::InvalidImage(e.to_string()))?;

    let info = ImageInfo {
        width: decoded.width(),
        height: decoded.height(),
        format,
    };
    debug!(width = info.width, height = info.height, format = ?info.format, "frame decoded");
    Ok(info)
}
