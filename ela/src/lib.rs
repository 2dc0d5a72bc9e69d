//! # ELA
//!
//! Error Level Analysis for detecting localized image tampering.
//!
//! An upload is decoded, re-encoded as JPEG at one fixed quality, decoded
//! again, and compared sample-by-sample with itself. Regions edited after the
//! image was last compressed have been through the codec a different number of
//! times and stand out with a higher error level than untouched regions.
//!
//! Pipeline, one run per request:
//!
//! 1. [`decode`]: bytes to a [`PixelBuffer`], with size limits checked on the
//!    header before any pixels are allocated
//! 2. [`recompress`]: JPEG round trip at [`CompressionParameters::quality`]
//! 3. [`compute_difference`]: per-sample absolute error as a [`DiffBuffer`]
//! 4. [`normalize`]: display stretch plus a scalar anomaly score
//! 5. [`render`]: heatmap artifact (PNG or JPEG)
//!
//! [`Analyzer`] drives the chain with a per-request deadline and a bound on
//! concurrent requests.
//!
//! ## Score
//!
//! The anomaly score is a statistic of the raw magnitudes divided by 255, so it
//! lies in 0.0..=1.0. The default statistic is the 99th percentile, which
//! ignores isolated noise spikes; [`ScoreStatistic::Maximum`] is the most
//! sensitive alternative.
//!
//! ## Example
//!
//! ```rust
//! use ela::{Analyzer, AnalyzerConfig};
//! use image::{ExtendedColorType, ImageEncoder};
//!
//! // A 32x32 gradient, saved as PNG.
//! let pixels: Vec<u8> = (0..32 * 32)
//!     .flat_map(|i| [(i % 32 * 8) as u8, (i / 32 * 8) as u8, 128])
//!     .collect();
//! let mut png = Vec::new();
//! image::codecs::png::PngEncoder::new(&mut png)
//!     .write_image(&pixels, 32, 32, ExtendedColorType::Rgb8)
//!     .unwrap();
//!
//! let analyzer = Analyzer::new(AnalyzerConfig::default())?;
//! let result = analyzer.analyze(&png, None).unwrap();
//!
//! assert_eq!(result.dimensions(), (32, 32));
//! assert!((0.0..=1.0).contains(&result.anomaly_score));
//! # Ok::<(), ela::ConfigError>(())
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::float_cmp)]

pub mod buffer;
pub mod config;
pub mod decode;
pub mod difference;
pub mod error;
pub mod format;
pub mod limits;
pub mod normalize;
pub mod orchestrator;
pub mod recompress;
pub mod render;
pub mod stats;

pub use buffer::{BufferError, DiffBuffer, PixelBuffer, MAX_SAMPLE};
pub use config::AnalyzerConfig;
pub use decode::{decode, Decoded};
pub use difference::compute_difference;
pub use error::{
    AnalysisError, ConfigError, DecodeError, EncodeError, ErrorKind, RecompressionError, Shape,
    ShapeMismatch,
};
pub use format::ImageFormat;
pub use limits::{DecodeLimits, LimitExceeded};
pub use normalize::{normalize, Amplification, Normalized, ScoreStatistic};
pub use orchestrator::{Admission, AnalysisResult, Analyzer, RequestContext, Stage};
pub use recompress::{recompress, CompressionParameters};
pub use render::{render, Artifact, ArtifactFormat, HeatmapStyle};
pub use stats::{Assessment, ErrorLevelStats, Verdict};

pub use imgref::{Img, ImgRef, ImgVec};
