//! Recompression engine: the controlled lossy round trip.
//!
//! The decoded upload is re-encoded as JPEG at one fixed quality and decoded
//! back. Keeping the quality and encoder settings identical for every request
//! is what makes error levels comparable between uploads.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{ConfigError, RecompressionError, Shape};

/// Default recompression quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// Settings of the controlled re-encode.
///
/// Only the quality is tunable; chroma subsampling and the remaining encoder
/// settings are the fixed defaults of the `image` JPEG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompressionParameters {
    quality: u8,
}

impl Default for CompressionParameters {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

impl CompressionParameters {
    /// Creates parameters for the given JPEG quality.
    ///
    /// # Errors
    /// Quality must lie in 1..=100.
    pub fn new(quality: u8) -> Result<Self, ConfigError> {
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::Quality(quality));
        }
        Ok(Self { quality })
    }

    /// JPEG quality, 1..=100.
    #[must_use]
    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl TryFrom<u8> for CompressionParameters {
    type Error = ConfigError;

    fn try_from(quality: u8) -> Result<Self, Self::Error> {
        Self::new(quality)
    }
}

impl From<CompressionParameters> for u8 {
    fn from(params: CompressionParameters) -> Self {
        params.quality
    }
}

/// Encodes `original` as JPEG at the configured quality.
///
/// # Errors
/// Fails for buffers with alpha channels or when the encoder rejects the data.
pub fn encode_jpeg(
    original: &PixelBuffer,
    params: &CompressionParameters,
) -> Result<Vec<u8>, RecompressionError> {
    let color = match original.channels() {
        1 => ExtendedColorType::L8,
        3 => ExtendedColorType::Rgb8,
        channels => return Err(RecompressionError::UnsupportedChannels { channels }),
    };

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, params.quality)
        .encode(
            original.as_slice(),
            original.width(),
            original.height(),
            color,
        )
        .map_err(|source| RecompressionError::Encode {
            quality: params.quality,
            source,
        })?;
    Ok(encoded)
}

/// Round-trips `original` through JPEG and returns the decoded result.
///
/// The output always has the same width, height and channel count as the
/// input.
///
/// # Errors
/// Returns [`RecompressionError`] when encoding or decoding fails or the
/// decoded result changed shape.
pub fn recompress(
    original: &PixelBuffer,
    params: &CompressionParameters,
) -> Result<PixelBuffer, RecompressionError> {
    let encoded = encode_jpeg(original, params)?;

    let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Jpeg)
        .map_err(|source| RecompressionError::Decode { source })?;
    let (width, height) = decoded.dimensions();
    let samples = if original.channels() == 1 {
        decoded.into_luma8().into_raw()
    } else {
        decoded.into_rgb8().into_raw()
    };

    let expected = original.shape();
    let round_trip = PixelBuffer::new(width, height, original.channels(), samples).map_err(|_| {
        RecompressionError::ShapeChanged {
            expected,
            actual: Shape {
                width,
                height,
                channels: original.channels(),
            },
        }
    })?;
    if round_trip.shape() != expected {
        return Err(RecompressionError::ShapeChanged {
            expected,
            actual: round_trip.shape(),
        });
    }
    Ok(round_trip)
}
