//! Error types for the ELA pipeline.
//!
//! Every stage has its own error enum so that stage functions can be used and
//! tested on their own. The [`Analyzer`](crate::Analyzer) collapses all of them
//! into a single [`AnalysisError`] carrying one [`ErrorKind`]; raw stage errors
//! never cross the orchestrator boundary.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::format::ImageFormat;
use crate::limits::LimitExceeded;
use crate::render::ArtifactFormat;

/// Width, height and channel count of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Shape {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Samples per pixel.
    pub channels: u8,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Failure to turn uploaded bytes into a [`PixelBuffer`](crate::PixelBuffer).
///
/// These are caused by the input, not by the pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// No bytes were supplied.
    #[error("input is empty")]
    Empty,
    /// Magic bytes do not match any supported format.
    #[error("unsupported or unrecognized image format")]
    UnsupportedFormat,
    /// Declared size exceeds a configured limit.
    #[error(transparent)]
    Limit(#[from] LimitExceeded),
    /// Header declares an empty image.
    #[error("image has a zero dimension: {width}x{height}")]
    ZeroDimension {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// Bytes are truncated or corrupt.
    #[error("malformed {format} data: {source}")]
    Malformed {
        /// Format the bytes were decoded as.
        format: ImageFormat,
        /// Codec error.
        #[source]
        source: image::ImageError,
    },
}

/// Failure in the encode-then-decode round trip.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecompressionError {
    /// JPEG holds gray or RGB only.
    #[error("cannot JPEG-encode a buffer with {channels} channels")]
    UnsupportedChannels {
        /// Channel count of the rejected buffer.
        channels: u8,
    },
    /// The lossy encoder rejected the buffer.
    #[error("JPEG encode at quality {quality} failed: {source}")]
    Encode {
        /// Quality the encode ran at.
        quality: u8,
        /// Codec error.
        #[source]
        source: image::ImageError,
    },
    /// The freshly encoded bytes could not be decoded again.
    #[error("decoding the recompressed JPEG failed: {source}")]
    Decode {
        /// Codec error.
        #[source]
        source: image::ImageError,
    },
    /// The round trip produced a buffer of a different shape.
    #[error("round trip changed shape: {expected} became {actual}")]
    ShapeChanged {
        /// Shape of the input.
        expected: Shape,
        /// Shape after the round trip.
        actual: Shape,
    },
}

/// Two buffers that must be compared sample-by-sample differ in shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer shapes differ: {original} vs {recompressed}")]
pub struct ShapeMismatch {
    /// Shape of the decoded original.
    pub original: Shape,
    /// Shape of the round-tripped buffer.
    pub recompressed: Shape,
}

/// Failure to encode the heatmap artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// Only gray (1) and RGB (3) buffers can be rendered.
    #[error("cannot render a buffer with {channels} channels")]
    UnsupportedChannels {
        /// Channel count of the rejected buffer.
        channels: u8,
    },
    /// The artifact codec failed.
    #[error("{format} encode failed: {source}")]
    Codec {
        /// Target artifact format.
        format: ArtifactFormat,
        /// Codec error.
        #[source]
        source: image::ImageError,
    },
}

/// Invalid analyzer configuration, reported once at startup.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// JPEG quality must lie in 1..=100.
    #[error("quality {0} is outside 1..=100")]
    Quality(u8),
    /// A limit that must be non-zero was zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    /// Percentile must lie in (0, 100].
    #[error("percentile {0} is outside (0, 100]")]
    Percentile(f64),
    /// Brightness gain must be finite and positive.
    #[error("brightness gain {0} must be finite and positive")]
    Gain(f32),
    /// Manipulation threshold must be finite and non-negative.
    #[error("manipulation threshold {0} must be finite and non-negative")]
    Threshold(f64),
}

/// Caller-facing failure category.
///
/// Exactly one kind is reported per failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, unsupported or oversized input.
    Decode,
    /// The controlled re-encode failed.
    Recompression,
    /// Original and round-trip buffers disagree in shape.
    ShapeMismatch,
    /// The heatmap could not be encoded.
    Encode,
    /// The request deadline passed.
    Timeout,
    /// Too many requests are in flight.
    Capacity,
}

impl ErrorKind {
    /// Stable identifier for logs and JSON output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode_error",
            Self::Recompression => "recompression_error",
            Self::ShapeMismatch => "shape_mismatch_error",
            Self::Encode => "encode_error",
            Self::Timeout => "timeout_error",
            Self::Capacity => "capacity_error",
        }
    }

    /// Whether resubmitting the same input can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Capacity)
    }

    /// Whether the failure points at a pipeline bug rather than bad input.
    pub fn is_internal(self) -> bool {
        matches!(self, Self::Recompression | Self::ShapeMismatch | Self::Encode)
    }

    /// HTTP-equivalent status code.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Decode => 400,
            Self::Recompression | Self::ShapeMismatch | Self::Encode => 500,
            Self::Capacity => 503,
            Self::Timeout => 504,
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed analysis as reported to the caller. No partial results.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{request_id}: {kind}: {message}")]
pub struct AnalysisError {
    /// Identifier of the failed request.
    pub request_id: String,
    /// Failure category.
    #[serde(rename = "error_kind")]
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl AnalysisError {
    pub(crate) fn new(request_id: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.to_owned(),
            kind,
            message: message.into(),
        }
    }
}
