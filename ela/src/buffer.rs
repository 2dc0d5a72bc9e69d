//! Pixel and difference buffers.
//!
//! Both buffers store samples interleaved in row-major order with no row
//! padding. The length invariant `len == width * height * channels` is checked
//! at construction and cannot be broken afterwards, since the sample storage is
//! only reachable through slices.

use imgref::ImgVec;
use thiserror::Error;

use crate::error::Shape;

/// Maximum sample value of the 8-bit pixel buffers.
pub const MAX_SAMPLE: u8 = u8::MAX;

/// Invalid buffer construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BufferError {
    /// Width or height is zero.
    #[error("buffer has a zero dimension: {width}x{height}")]
    ZeroDimension {
        /// Width provided.
        width: u32,
        /// Height provided.
        height: u32,
    },
    /// Channel count is outside 1..=4.
    #[error("unsupported channel count {0}")]
    Channels(u8),
    /// Sample count doesn't match the declared shape.
    #[error("buffer length {actual} doesn't match expected length {expected}")]
    Length {
        /// Expected number of samples.
        expected: usize,
        /// Number of samples provided.
        actual: usize,
    },
}

fn checked_len(width: u32, height: u32, channels: u8) -> Result<usize, BufferError> {
    if width == 0 || height == 0 {
        return Err(BufferError::ZeroDimension { width, height });
    }
    if !(1..=4).contains(&channels) {
        return Err(BufferError::Channels(channels));
    }
    Ok(width as usize * height as usize * channels as usize)
}

/// Luma from 8-bit RGB using ITU-R 601 weights in 16-bit fixed point.
#[inline]
pub(crate) fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    let y = u32::from(r) * 19_595 + u32::from(g) * 38_470 + u32::from(b) * 7_471 + 0x8000;
    (y >> 16) as u8
}

/// Decoded 8-bit image owned by one pipeline stage at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps interleaved samples.
    ///
    /// # Errors
    /// Fails on a zero dimension, a channel count outside 1..=4, or a sample
    /// count that doesn't match `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, BufferError> {
        let expected = checked_len(width, height, channels)?;
        if data.len() != expected {
            return Err(BufferError::Length {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Wraps samples whose shape was already validated by another buffer.
    pub(crate) fn from_parts(shape: Shape, data: Vec<u8>) -> Self {
        debug_assert_eq!(
            data.len(),
            shape.width as usize * shape.height as usize * shape.channels as usize
        );
        Self {
            width: shape.width,
            height: shape.height,
            channels: shape.channels,
            data,
        }
    }

    /// Creates a buffer filled with a constant sample value.
    ///
    /// # Errors
    /// Fails on a zero dimension or an unsupported channel count.
    pub fn filled(width: u32, height: u32, channels: u8, value: u8) -> Result<Self, BufferError> {
        let len = checked_len(width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![value; len],
        })
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Width, height and channels together.
    pub fn shape(&self) -> Shape {
        Shape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// Samples per row.
    #[inline]
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// All samples, row-major and interleaved.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer and returns its samples.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Per-pixel luma. Gray buffers are copied as-is; color channels beyond
    /// the first three (alpha) are ignored.
    pub fn luminance(&self) -> ImgVec<u8> {
        let c = self.channels as usize;
        let luma: Vec<u8> = match c {
            1 | 2 => self.data.chunks_exact(c).map(|p| p[0]).collect(),
            _ => self
                .data
                .chunks_exact(c)
                .map(|p| luma_601(p[0], p[1], p[2]))
                .collect(),
        };
        ImgVec::new(luma, self.width as usize, self.height as usize)
    }
}

/// Absolute per-sample differences between two pixel buffers.
///
/// Magnitudes are stored as `u16` so amplification can be applied without
/// wrapping before values are brought back to the display range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u16>,
}

impl DiffBuffer {
    /// Wraps interleaved magnitudes.
    ///
    /// # Errors
    /// Same shape rules as [`PixelBuffer::new`].
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u16>) -> Result<Self, BufferError> {
        let expected = checked_len(width, height, channels)?;
        if data.len() != expected {
            return Err(BufferError::Length {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub(crate) fn from_parts(shape: Shape, data: Vec<u16>) -> Self {
        debug_assert_eq!(
            data.len(),
            shape.width as usize * shape.height as usize * shape.channels as usize
        );
        Self {
            width: shape.width,
            height: shape.height,
            channels: shape.channels,
            data,
        }
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Width, height and channels together.
    pub fn shape(&self) -> Shape {
        Shape {
            width: self.width,
            height: self.height,
            channels: self.channels,
        }
    }

    /// All magnitudes, row-major and interleaved.
    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    /// Largest magnitude, 0 for identical inputs.
    pub fn max_magnitude(&self) -> u16 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    /// Whether every magnitude is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&m| m == 0)
    }

    /// Per-pixel luma of the magnitudes multiplied by `gain`, clamped to 0..=255.
    pub fn luminance_scaled(&self, gain: f32) -> ImgVec<u8> {
        let c = self.channels as usize;
        let scale = |m: u16| (f32::from(m) * gain).round().clamp(0.0, 255.0) as u8;
        let luma: Vec<u8> = self
            .data
            .chunks_exact(c)
            .map(|p| match c {
                1 | 2 => scale(p[0]),
                _ => luma_601(scale(p[0]), scale(p[1]), scale(p[2])),
            })
            .collect();
        ImgVec::new(luma, self.width as usize, self.height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(
            PixelBuffer::new(0, 4, 3, vec![]),
            Err(BufferError::ZeroDimension {
                width: 0,
                height: 4
            })
        );
        assert_eq!(
            PixelBuffer::new(2, 2, 5, vec![0; 20]),
            Err(BufferError::Channels(5))
        );
        assert_eq!(
            PixelBuffer::new(2, 2, 3, vec![0; 11]),
            Err(BufferError::Length {
                expected: 12,
                actual: 11
            })
        );
        assert!(DiffBuffer::new(2, 2, 1, vec![0; 3]).is_err());
    }

    #[test]
    fn row_len_counts_samples() {
        let data: Vec<u8> = (0..2 * 3 * 3).map(|i| i as u8).collect();
        let buf = PixelBuffer::new(3, 2, 3, data).unwrap();
        assert_eq!(buf.row_len(), 9);
        assert_eq!(buf.shape().to_string(), "3x2x3");
    }

    #[test]
    fn luma_of_primaries() {
        assert_eq!(luma_601(0, 0, 0), 0);
        assert_eq!(luma_601(255, 255, 255), 255);
        assert_eq!(luma_601(255, 0, 0), 76);
        assert_eq!(luma_601(0, 255, 0), 150);
        assert_eq!(luma_601(0, 0, 255), 29);
    }

    #[test]
    fn gray_luminance_is_identity() {
        let buf = PixelBuffer::new(2, 1, 1, vec![7, 200]).unwrap();
        let luma = buf.luminance();
        assert_eq!(luma.buf().as_slice(), &[7, 200]);
        assert_eq!((luma.width(), luma.height()), (2, 1));
    }

    #[test]
    fn scaled_luminance_clamps() {
        let diff = DiffBuffer::new(2, 1, 1, vec![3, 40]).unwrap();
        let luma = diff.luminance_scaled(10.0);
        assert_eq!(luma.buf().as_slice(), &[30, 255]);
        assert_eq!(diff.max_magnitude(), 40);
        assert!(!diff.is_zero());
    }
}
