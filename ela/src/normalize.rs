//! Amplifier/normalizer and anomaly score.
//!
//! Raw error levels are small (a few units out of 255 for untouched JPEG
//! regions) and have to be stretched before they are visible. The scalar score
//! is computed from the raw magnitudes, independently of the display stretch,
//! so it stays comparable between uploads.

use serde::{Deserialize, Serialize};

use crate::buffer::{DiffBuffer, PixelBuffer, MAX_SAMPLE};

/// How raw magnitudes are mapped into the 0..=255 display range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amplification {
    /// Linear stretch so the largest magnitude maps to 255 and zero to 0.
    FullRange,
    /// Multiply by a fixed gain and clamp at 255.
    Brightness {
        /// Multiplier applied to every magnitude.
        gain: f32,
    },
}

impl Default for Amplification {
    fn default() -> Self {
        Self::FullRange
    }
}

/// Statistic of the raw magnitude distribution used as the anomaly score.
///
/// A high percentile is the default because a single noisy sample should
/// not decide the score; `Maximum` is the most sensitive choice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStatistic {
    /// Nearest-rank percentile in (0, 100].
    Percentile(f64),
    /// Largest magnitude.
    Maximum,
    /// Arithmetic mean.
    Mean,
}

impl Default for ScoreStatistic {
    fn default() -> Self {
        Self::Percentile(DEFAULT_PERCENTILE)
    }
}

/// Default score percentile.
pub const DEFAULT_PERCENTILE: f64 = 99.0;

/// Output of the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Display-range buffer, same shape as the diff.
    pub buffer: PixelBuffer,
    /// Anomaly score in 0.0..=1.0.
    pub score: f64,
    /// Largest raw magnitude.
    pub max_magnitude: u16,
}

/// Maps every magnitude into 0..=255.
///
/// An all-zero diff yields an all-zero buffer in every mode.
pub fn amplify(diff: &DiffBuffer, amplification: Amplification) -> PixelBuffer {
    let max = u32::from(diff.max_magnitude());
    let samples: Vec<u8> = match amplification {
        _ if max == 0 => vec![0; diff.as_slice().len()],
        Amplification::FullRange => {
            let top = u32::from(MAX_SAMPLE);
            diff.as_slice()
                .iter()
                .map(|&m| ((u32::from(m) * top + max / 2) / max) as u8)
                .collect()
        }
        Amplification::Brightness { gain } => diff
            .as_slice()
            .iter()
            .map(|&m| (f32::from(m) * gain).round().clamp(0.0, f32::from(MAX_SAMPLE)) as u8)
            .collect(),
    };

    PixelBuffer::from_parts(diff.shape(), samples)
}

/// Computes the anomaly score of a diff, scaled into 0.0..=1.0.
///
/// Identical inputs score exactly 0.
pub fn anomaly_score(diff: &DiffBuffer, statistic: ScoreStatistic) -> f64 {
    let samples = diff.as_slice();
    let max = diff.max_magnitude();
    if max == 0 {
        return 0.0;
    }

    let raw = match statistic {
        ScoreStatistic::Maximum => f64::from(max),
        ScoreStatistic::Mean => {
            let sum: u64 = samples.iter().map(|&m| u64::from(m)).sum();
            sum as f64 / samples.len() as f64
        }
        ScoreStatistic::Percentile(p) => f64::from(percentile(samples, max, p)),
    };
    (raw / f64::from(MAX_SAMPLE)).clamp(0.0, 1.0)
}

/// Nearest-rank percentile via a histogram, O(n) and exact.
fn percentile(samples: &[u16], max: u16, p: f64) -> u16 {
    let mut histogram = vec![0u64; usize::from(max) + 1];
    for &m in samples {
        histogram[usize::from(m)] += 1;
    }

    let n = samples.len() as f64;
    let rank = (p.clamp(0.0, 100.0) * n / 100.0).ceil().max(1.0) as u64;
    let mut seen = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        seen += count;
        if seen >= rank {
            return value as u16;
        }
    }
    max
}

/// Amplifies `diff` and scores it.
pub fn normalize(
    diff: &DiffBuffer,
    amplification: Amplification,
    statistic: ScoreStatistic,
) -> Normalized {
    Normalized {
        buffer: amplify(diff, amplification),
        score: anomaly_score(diff, statistic),
        max_magnitude: diff.max_magnitude(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(values: Vec<u16>) -> DiffBuffer {
        let len = values.len() as u32;
        DiffBuffer::new(len, 1, 1, values).unwrap()
    }

    #[test]
    fn zero_diff_floor() {
        let d = diff(vec![0; 16]);
        for amp in [
            Amplification::FullRange,
            Amplification::Brightness { gain: 10.0 },
        ] {
            let n = normalize(&d, amp, ScoreStatistic::default());
            assert!(n.buffer.as_slice().iter().all(|&v| v == 0));
            assert_eq!(n.score, 0.0);
            assert_eq!(n.max_magnitude, 0);
        }
    }

    #[test]
    fn full_range_stretches_max_to_255() {
        let d = diff(vec![0, 1, 2, 4]);
        let out = amplify(&d, Amplification::FullRange);
        assert_eq!(out.as_slice(), &[0, 64, 128, 255]);
    }

    #[test]
    fn brightness_clamps() {
        let d = diff(vec![0, 3, 30, 255]);
        let out = amplify(&d, Amplification::Brightness { gain: 10.0 });
        assert_eq!(out.as_slice(), &[0, 30, 255, 255]);
    }

    #[test]
    fn percentile_resists_single_spike() {
        let mut values = vec![2u16; 999];
        values.push(255);
        let d = diff(values);
        let p99 = anomaly_score(&d, ScoreStatistic::Percentile(99.0));
        let max = anomaly_score(&d, ScoreStatistic::Maximum);
        assert!((p99 - 2.0 / 255.0).abs() < 1e-12);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn percentile_nearest_rank() {
        let values: Vec<u16> = (1..=100).collect();
        assert_eq!(percentile(&values, 100, 50.0), 50);
        assert_eq!(percentile(&values, 100, 99.0), 99);
        assert_eq!(percentile(&values, 100, 100.0), 100);
        assert_eq!(percentile(&values, 100, 0.001), 1);
    }

    #[test]
    fn mean_score() {
        let d = diff(vec![0, 51, 102, 153]);
        let score = anomaly_score(&d, ScoreStatistic::Mean);
        assert!((score - 76.5 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn statistic_serde_shape() {
        let s: ScoreStatistic = serde_json::from_str(r#"{"percentile": 95.0}"#).unwrap();
        assert_eq!(s, ScoreStatistic::Percentile(95.0));
        let s: ScoreStatistic = serde_json::from_str(r#""maximum""#).unwrap();
        assert_eq!(s, ScoreStatistic::Maximum);
        let a: Amplification = serde_json::from_str(r#"{"brightness": {"gain": 10.0}}"#).unwrap();
        assert_eq!(a, Amplification::Brightness { gain: 10.0 });
    }
}
