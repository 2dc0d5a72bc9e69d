//! Image decoder: uploaded bytes to [`PixelBuffer`].
//!
//! Rejection happens as early as possible: empty and oversized inputs before
//! the format is sniffed, oversized dimensions right after the header is
//! probed and before any pixel allocation. The codec also gets allocation
//! limits of its own as a second guard.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageReader};

use crate::buffer::PixelBuffer;
use crate::error::DecodeError;
use crate::format::ImageFormat;
use crate::limits::DecodeLimits;

/// A decoded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Format detected from the magic bytes.
    pub format: ImageFormat,
    /// Decoded samples: 1 channel for grayscale sources, 3 for everything else.
    pub buffer: PixelBuffer,
}

/// Picks the format to decode as.
///
/// Magic bytes win over the hint; the hint is only used when the prefix is
/// not recognized and the hint names a format.
fn resolve_format(bytes: &[u8], hint: Option<ImageFormat>) -> Result<ImageFormat, DecodeError> {
    match (ImageFormat::detect(bytes), hint) {
        (Some(sniffed), Some(hinted)) if sniffed != hinted => {
            tracing::debug!(%sniffed, %hinted, "format hint disagrees with magic bytes");
            Ok(sniffed)
        }
        (Some(format), _) | (None, Some(format)) => Ok(format),
        (None, None) => Err(DecodeError::UnsupportedFormat),
    }
}

/// Decodes `bytes` into a pixel buffer.
///
/// # Errors
/// Returns [`DecodeError`] when the input is empty, too large, of an unknown
/// format, declares a zero or oversized dimension, or is truncated/corrupt.
pub fn decode(
    bytes: &[u8],
    hint: Option<ImageFormat>,
    limits: &DecodeLimits,
) -> Result<Decoded, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    limits.check_input_size(bytes.len())?;

    let format = resolve_format(bytes, hint)?;
    let malformed = |source| DecodeError::Malformed { format, source };

    // Header only; no pixel data is touched yet. The codec's own limits are
    // lifted here so that oversized headers reach `check_dimensions`.
    let mut probe = ImageReader::with_format(Cursor::new(bytes), format.codec());
    probe.no_limits();
    let (width, height) = probe.into_dimensions().map_err(malformed)?;
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroDimension { width, height });
    }
    limits.check_dimensions(width, height)?;

    let mut codec_limits = image::Limits::default();
    codec_limits.max_image_width = Some(limits.max_width);
    codec_limits.max_image_height = Some(limits.max_height);
    codec_limits.max_alloc = Some(limits.max_alloc_bytes());

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format.codec());
    reader.limits(codec_limits);
    let image = reader.decode().map_err(malformed)?;

    let buffer = to_pixel_buffer(image)?;
    Ok(Decoded { format, buffer })
}

/// Reduces any decoded color model to 8-bit gray or 8-bit RGB.
fn to_pixel_buffer(image: DynamicImage) -> Result<PixelBuffer, DecodeError> {
    let (width, height) = image.dimensions();
    let zero = |_| DecodeError::ZeroDimension { width, height };
    if image.color().has_color() {
        PixelBuffer::new(width, height, 3, image.into_rgb8().into_raw()).map_err(zero)
    } else {
        PixelBuffer::new(width, height, 1, image.into_luma8().into_raw()).map_err(zero)
    }
}
