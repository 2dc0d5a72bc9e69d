//! Analyzer configuration.
//!
//! Read once at startup, validated, then frozen inside the
//! [`Analyzer`](crate::Analyzer). Every request sees the same values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::limits::DecodeLimits;
use crate::normalize::{Amplification, ScoreStatistic};
use crate::recompress::{CompressionParameters, DEFAULT_QUALITY};
use crate::render::{ArtifactFormat, HeatmapStyle};
use crate::stats::DEFAULT_MANIPULATION_THRESHOLD;

/// Default per-request deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default bound on concurrently running requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Process-wide analyzer settings.
///
/// Use the builder methods to construct:
/// ```rust
/// use ela::{AnalyzerConfig, ScoreStatistic};
///
/// let config = AnalyzerConfig::new()
///     .with_quality(85)
///     .with_max_in_flight(4)
///     .with_score_statistic(ScoreStatistic::Maximum);
/// assert!(config.validate().is_ok());
/// ```
///
/// Missing fields fall back to their defaults when deserializing, so a JSON
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// JPEG quality of the controlled re-encode, 1..=100.
    pub quality: u8,
    /// Largest accepted image width.
    pub max_width: u32,
    /// Largest accepted image height.
    pub max_height: u32,
    /// Largest accepted pixel count.
    pub max_pixels: u64,
    /// Largest accepted upload size in bytes.
    pub max_input_bytes: u64,
    /// Per-request deadline.
    pub timeout_ms: u64,
    /// Requests allowed to run at once; further requests are rejected.
    pub max_in_flight: usize,
    /// Statistic behind the anomaly score.
    pub score_statistic: ScoreStatistic,
    /// Display stretch of the heatmap.
    pub amplification: Amplification,
    /// Heatmap coloring.
    pub heatmap_style: HeatmapStyle,
    /// Heatmap container.
    pub artifact_format: ArtifactFormat,
    /// Mean error level above which the verdict is "likely manipulated".
    pub manipulation_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let limits = DecodeLimits::default();
        Self {
            quality: DEFAULT_QUALITY,
            max_width: limits.max_width,
            max_height: limits.max_height,
            max_pixels: limits.max_pixels,
            max_input_bytes: limits.max_input_bytes,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            score_statistic: ScoreStatistic::default(),
            amplification: Amplification::default(),
            heatmap_style: HeatmapStyle::default(),
            artifact_format: ArtifactFormat::default(),
            manipulation_threshold: DEFAULT_MANIPULATION_THRESHOLD,
        }
    }
}

impl AnalyzerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recompression quality.
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the maximum accepted width and height.
    #[must_use]
    pub fn with_max_dimensions(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width;
        self.max_height = max_height;
        self
    }

    /// Sets the maximum accepted pixel count.
    #[must_use]
    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    /// Sets the maximum accepted upload size.
    #[must_use]
    pub fn with_max_input_bytes(mut self, max_input_bytes: u64) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    /// Sets the per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the concurrency bound.
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Sets the anomaly score statistic.
    #[must_use]
    pub fn with_score_statistic(mut self, statistic: ScoreStatistic) -> Self {
        self.score_statistic = statistic;
        self
    }

    /// Sets the heatmap amplification.
    #[must_use]
    pub fn with_amplification(mut self, amplification: Amplification) -> Self {
        self.amplification = amplification;
        self
    }

    /// Sets the heatmap style.
    #[must_use]
    pub fn with_heatmap_style(mut self, style: HeatmapStyle) -> Self {
        self.heatmap_style = style;
        self
    }

    /// Sets the heatmap container format.
    #[must_use]
    pub fn with_artifact_format(mut self, format: ArtifactFormat) -> Self {
        self.artifact_format = format;
        self
    }

    /// Sets the verdict threshold on the mean error level.
    #[must_use]
    pub fn with_manipulation_threshold(mut self, threshold: f64) -> Self {
        self.manipulation_threshold = threshold;
        self
    }

    /// Per-request deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Decode limits derived from this configuration.
    pub fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits {
            max_width: self.max_width,
            max_height: self.max_height,
            max_pixels: self.max_pixels,
            max_input_bytes: self.max_input_bytes,
        }
    }

    /// Recompression parameters derived from this configuration.
    ///
    /// # Errors
    /// Fails if the quality is outside 1..=100.
    pub fn compression_parameters(&self) -> Result<CompressionParameters, ConfigError> {
        CompressionParameters::new(self.quality)
    }

    /// Checks every field.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compression_parameters()?;

        let nonzero = [
            ("max_width", self.max_width == 0),
            ("max_height", self.max_height == 0),
            ("max_pixels", self.max_pixels == 0),
            ("max_input_bytes", self.max_input_bytes == 0),
            ("timeout_ms", self.timeout_ms == 0),
            ("max_in_flight", self.max_in_flight == 0),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::Zero(*name));
        }

        if let ScoreStatistic::Percentile(p) = self.score_statistic {
            if !(p > 0.0 && p <= 100.0) {
                return Err(ConfigError::Percentile(p));
            }
        }
        if let Amplification::Brightness { gain } = self.amplification {
            if !(gain.is_finite() && gain > 0.0) {
                return Err(ConfigError::Gain(gain));
            }
        }
        if !(self.manipulation_threshold.is_finite() && self.manipulation_threshold >= 0.0) {
            return Err(ConfigError::Threshold(self.manipulation_threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quality, 90);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.decode_limits(), DecodeLimits::default());
    }

    #[test]
    fn builder_sets_fields() {
        let config = AnalyzerConfig::new()
            .with_quality(70)
            .with_max_dimensions(100, 200)
            .with_timeout(Duration::from_millis(250))
            .with_artifact_format(ArtifactFormat::Jpeg);
        assert_eq!(config.quality, 70);
        assert_eq!(config.decode_limits().max_height, 200);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.artifact_format, ArtifactFormat::Jpeg);
    }

    #[test]
    fn rejects_invalid_fields() {
        assert_eq!(
            AnalyzerConfig::new().with_quality(0).validate(),
            Err(ConfigError::Quality(0))
        );
        assert_eq!(
            AnalyzerConfig::new().with_max_in_flight(0).validate(),
            Err(ConfigError::Zero("max_in_flight"))
        );
        assert_eq!(
            AnalyzerConfig::new()
                .with_score_statistic(ScoreStatistic::Percentile(0.0))
                .validate(),
            Err(ConfigError::Percentile(0.0))
        );
        assert!(AnalyzerConfig::new()
            .with_score_statistic(ScoreStatistic::Percentile(f64::NAN))
            .validate()
            .is_err());
        assert_eq!(
            AnalyzerConfig::new()
                .with_amplification(Amplification::Brightness { gain: -1.0 })
                .validate(),
            Err(ConfigError::Gain(-1.0))
        );
        assert_eq!(
            AnalyzerConfig::new()
                .with_manipulation_threshold(-2.0)
                .validate(),
            Err(ConfigError::Threshold(-2.0))
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: AnalyzerConfig = serde_json::from_str(
            r#"{"quality": 75, "score_statistic": "maximum", "heatmap_style": "colormap"}"#,
        )
        .unwrap();
        assert_eq!(config.quality, 75);
        assert_eq!(config.score_statistic, ScoreStatistic::Maximum);
        assert_eq!(config.heatmap_style, HeatmapStyle::Colormap);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
    }

    #[test]
    fn json_round_trip() {
        let config = AnalyzerConfig::new()
            .with_amplification(Amplification::Brightness { gain: 10.0 })
            .with_score_statistic(ScoreStatistic::Percentile(95.0));
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalyzerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
