//! Error-level statistics and the authenticity assessment derived from them.
//!
//! Statistics are taken over the luminance of the raw difference scaled by a
//! fixed reference gain, not over the display-stretched heatmap, so two uploads
//! with the same error levels get the same numbers whatever amplification the
//! heatmap uses.

use imgref::ImgRef;
use serde::{Deserialize, Serialize};

use crate::buffer::DiffBuffer;

/// Gain applied to raw magnitudes before statistics are taken.
pub const REFERENCE_GAIN: f32 = 10.0;

/// Default mean error level above which an image is reported as manipulated.
pub const DEFAULT_MANIPULATION_THRESHOLD: f64 = 15.0;

/// Summary of the scaled error-level luminance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorLevelStats {
    /// Mean error level, 0..=255.
    pub mean: f64,
    /// Population standard deviation of the error level.
    pub std_dev: f64,
    /// Percentage of pixels brighter than `mean + std_dev`.
    pub high_variance_percent: f64,
    /// Sum of absolute vertical and horizontal neighbor differences per pixel.
    pub edge_density: f64,
}

impl ErrorLevelStats {
    /// Computes statistics for `diff` at [`REFERENCE_GAIN`].
    pub fn from_diff(diff: &DiffBuffer) -> Self {
        Self::from_luma(diff.luminance_scaled(REFERENCE_GAIN).as_ref())
    }

    /// Computes statistics over an 8-bit luminance plane.
    pub fn from_luma(luma: ImgRef<'_, u8>) -> Self {
        let n = (luma.width() * luma.height()) as f64;
        if n == 0.0 {
            return Self::default();
        }

        let (sum, sum_sq) = luma.pixels().fold((0u64, 0u64), |(s, sq), v| {
            let v = u64::from(v);
            (s + v, sq + v * v)
        });
        let mean = sum as f64 / n;
        let variance = (sum_sq as f64 / n - mean * mean).max(0.0);
        let std_dev = variance.sqrt();

        let threshold = mean + std_dev;
        let high = luma.pixels().filter(|&v| f64::from(v) > threshold).count();

        let mut edges = 0u64;
        let mut prev: Option<&[u8]> = None;
        for row in luma.rows() {
            edges += row
                .windows(2)
                .map(|w| u64::from(w[0].abs_diff(w[1])))
                .sum::<u64>();
            if let Some(above) = prev {
                edges += above
                    .iter()
                    .zip(row)
                    .map(|(&a, &b)| u64::from(a.abs_diff(b)))
                    .sum::<u64>();
            }
            prev = Some(row);
        }

        Self {
            mean,
            std_dev,
            high_variance_percent: high as f64 / n * 100.0,
            edge_density: edges as f64 / n,
        }
    }

    /// Classifies these statistics against a mean threshold.
    pub fn assess(&self, manipulation_threshold: f64) -> Assessment {
        let mean_factor = (self.mean / 255.0 * 100.0).min(40.0);
        let std_factor = (self.std_dev / 50.0 * 20.0).min(20.0);
        let variance_factor = (self.high_variance_percent * 2.0).min(20.0);

        if self.mean > manipulation_threshold {
            let certainty = (50.0 + mean_factor + std_factor + variance_factor).min(100.0);
            Assessment {
                verdict: Verdict::LikelyManipulated,
                certainty: certainty as u8,
            }
        } else {
            let certainty =
                (100.0 - mean_factor - std_factor / 2.0 - variance_factor / 2.0).max(30.0);
            Assessment {
                verdict: Verdict::LikelyAuthentic,
                certainty: certainty as u8,
            }
        }
    }
}

/// Outcome of the threshold test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Error levels are uniform and low.
    LikelyAuthentic,
    /// Error levels are bright enough to suggest inconsistent compression.
    LikelyManipulated,
}

impl Verdict {
    /// Short label for reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::LikelyAuthentic => "likely authentic",
            Self::LikelyManipulated => "likely manipulated",
        }
    }
}

/// Verdict with a 0..=100 certainty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    /// Classification.
    pub verdict: Verdict,
    /// Confidence in percent. Never below 30 for authentic verdicts.
    pub certainty: u8,
}
