//! Decode-time resource limits.
//!
//! [`DecodeLimits`] caps what an upload may declare. The `check_*` methods are
//! meant to run on the header alone, before any pixel buffer is allocated, so a
//! decompression bomb is rejected without paying for it.

use thiserror::Error;

/// Caps on uploaded images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum image width in pixels.
    pub max_width: u32,
    /// Maximum image height in pixels.
    pub max_height: u32,
    /// Maximum total pixels (width × height).
    pub max_pixels: u64,
    /// Maximum input size in bytes.
    pub max_input_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_width: 16_384,
            max_height: 16_384,
            max_pixels: 64_000_000,
            max_input_bytes: 32 * 1024 * 1024,
        }
    }
}

impl DecodeLimits {
    /// Check image dimensions against `max_width`, `max_height`, and `max_pixels`.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), LimitExceeded> {
        if width > self.max_width {
            return Err(LimitExceeded::Width {
                actual: width,
                max: self.max_width,
            });
        }
        if height > self.max_height {
            return Err(LimitExceeded::Height {
                actual: height,
                max: self.max_height,
            });
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(LimitExceeded::Pixels {
                actual: pixels,
                max: self.max_pixels,
            });
        }
        Ok(())
    }

    /// Check input size against `max_input_bytes`.
    pub fn check_input_size(&self, bytes: usize) -> Result<(), LimitExceeded> {
        let bytes = bytes as u64;
        if bytes > self.max_input_bytes {
            return Err(LimitExceeded::InputSize {
                actual: bytes,
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Largest allocation a decode of an image within these limits needs:
    /// every pixel as 16-bit RGBA.
    pub(crate) fn max_alloc_bytes(&self) -> u64 {
        self.max_pixels.saturating_mul(8)
    }
}

/// A resource limit was exceeded.
///
/// Each variant carries the actual value and the limit that was exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LimitExceeded {
    /// Image width exceeded `max_width`.
    #[error("image width {actual} exceeds limit {max}")]
    Width {
        /// Actual width.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Image height exceeded `max_height`.
    #[error("image height {actual} exceeds limit {max}")]
    Height {
        /// Actual height.
        actual: u32,
        /// Maximum allowed.
        max: u32,
    },
    /// Pixel count exceeded `max_pixels`.
    #[error("pixel count {actual} exceeds limit {max}")]
    Pixels {
        /// Actual pixel count.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
    /// Input size exceeded `max_input_bytes`.
    #[error("input size {actual} bytes exceeds limit {max}")]
    InputSize {
        /// Actual size.
        actual: u64,
        /// Maximum allowed.
        max: u64,
    },
}
