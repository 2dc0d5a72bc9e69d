//! Request orchestrator.
//!
//! An [`Analyzer`] is cheap to clone and meant to be shared by every worker in
//! the process. Its only mutable state is the in-flight counter; the
//! configuration is frozen when the analyzer is built. Each request owns its
//! buffers from decode to render and drops them when it returns, whatever the
//! outcome.
//!
//! Admission is separate from execution so a caller can reserve a slot, and
//! learn about backpressure, before it has read the upload:
//!
//! ```rust
//! use ela::{Analyzer, AnalyzerConfig, ErrorKind};
//!
//! let analyzer = Analyzer::new(AnalyzerConfig::new().with_max_in_flight(1))?;
//! let first = analyzer.admit(Some("a".into())).unwrap();
//! let second = analyzer.admit(Some("b".into())).unwrap_err();
//! assert_eq!(second.kind, ErrorKind::Capacity);
//! drop(first);
//! assert_eq!(analyzer.in_flight(), 0);
//! # Ok::<(), ela::ConfigError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::config::AnalyzerConfig;
use crate::decode::decode;
use crate::difference::compute_difference;
use crate::error::{AnalysisError, ConfigError, ErrorKind};
use crate::format::ImageFormat;
use crate::limits::DecodeLimits;
use crate::normalize::normalize;
use crate::recompress::{recompress, CompressionParameters};
use crate::render::{render, Artifact};
use crate::stats::{Assessment, ErrorLevelStats};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Bytes to pixels.
    Decode,
    /// Controlled lossy round trip.
    Recompress,
    /// Per-sample absolute error.
    Difference,
    /// Amplification, score and statistics.
    Normalize,
    /// Heatmap encoding.
    Render,
}

impl Stage {
    /// Lowercase stage name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Recompress => "recompress",
            Self::Difference => "difference",
            Self::Normalize => "normalize",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    max: usize,
}

impl InFlight {
    fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            max,
        }
    }

    /// Takes a slot unless all `max` are taken. Never waits.
    fn try_enter(&self) -> bool {
        let mut current = self.current.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return false;
            }
            match self.current.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(current + 1, Ordering::AcqRel);
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
struct Shared {
    config: AnalyzerConfig,
    limits: DecodeLimits,
    compression: CompressionParameters,
    in_flight: InFlight,
}

/// Shared entry point for analyses.
#[derive(Debug, Clone)]
pub struct Analyzer {
    shared: Arc<Shared>,
}

impl Analyzer {
    /// Validates `config` and freezes it.
    ///
    /// # Errors
    /// Returns the first invalid configuration field.
    pub fn new(config: AnalyzerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let compression = config.compression_parameters()?;
        let limits = config.decode_limits();
        let in_flight = InFlight::new(config.max_in_flight);
        tracing::debug!(?config, "analyzer configured");
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                limits,
                compression,
                in_flight,
            }),
        })
    }

    /// The frozen configuration.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.shared.config
    }

    /// Requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.current.load(Ordering::Acquire)
    }

    /// Highest number of slots held at once since the analyzer was built.
    pub fn peak_in_flight(&self) -> usize {
        self.shared.in_flight.peak.load(Ordering::Acquire)
    }

    /// Reserves a slot for one request and starts its deadline.
    ///
    /// A missing `request_id` is replaced by a random `req-<16 hex>` id.
    ///
    /// # Errors
    /// Fails with [`ErrorKind::Capacity`] when `max_in_flight` requests are
    /// already admitted. Nothing is queued.
    pub fn admit(&self, request_id: Option<String>) -> Result<Admission, AnalysisError> {
        let request_id = request_id.unwrap_or_else(generate_request_id);
        if !self.shared.in_flight.try_enter() {
            let max = self.shared.in_flight.max;
            tracing::warn!(%request_id, max_in_flight = max, "request rejected at capacity");
            return Err(AnalysisError::new(
                &request_id,
                ErrorKind::Capacity,
                format!("{max} requests already in flight"),
            ));
        }

        let started = Instant::now();
        Ok(Admission {
            shared: Arc::clone(&self.shared),
            request_id,
            started,
            deadline: started + self.shared.config.timeout(),
            hint: None,
        })
    }

    /// Runs one complete analysis: [`admit`](Self::admit) then
    /// [`Admission::run`].
    ///
    /// # Errors
    /// Returns exactly one [`AnalysisError`] on failure; no partial result.
    pub fn analyze(
        &self,
        bytes: &[u8],
        request_id: Option<String>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.admit(request_id)?.run(bytes)
    }
}

fn generate_request_id() -> String {
    format!("req-{:016x}", rand::random::<u64>())
}

/// An admitted request holding one in-flight slot.
///
/// The slot is released when the admission is dropped, including when
/// [`run`](Self::run) returns.
#[derive(Debug)]
pub struct Admission {
    shared: Arc<Shared>,
    request_id: String,
    started: Instant,
    deadline: Instant,
    hint: Option<ImageFormat>,
}

impl Admission {
    /// Identifier of this request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Moment after which the request fails with a timeout.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Shortens this request's deadline to `timeout` after admission. Never
    /// extends it, and never affects other requests.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = self.deadline.min(self.started + timeout);
        self
    }

    /// Format to try when the magic bytes are not recognized.
    #[must_use]
    pub fn with_format_hint(mut self, hint: ImageFormat) -> Self {
        self.hint = Some(hint);
        self
    }

    /// Runs decode, recompress, difference, normalize and render in order.
    ///
    /// # Errors
    /// Stage failures are mapped onto [`ErrorKind`]; a deadline that passes
    /// between stages yields [`ErrorKind::Timeout`].
    pub fn run(self, bytes: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        let ctx = RequestContext {
            request_id: &self.request_id,
            started: self.started,
            deadline: self.deadline,
            bytes,
        };
        let span = tracing::info_span!("analyze", request_id = %ctx.request_id);
        let _enter = span.enter();
        let shared = &*self.shared;
        let config = &shared.config;

        let decoded = ctx.stage(Stage::Decode, ErrorKind::Decode, || {
            decode(ctx.bytes, self.hint, &shared.limits)
        })?;
        let original = decoded.buffer;

        let round_trip = ctx.stage(Stage::Recompress, ErrorKind::Recompression, || {
            recompress(&original, &shared.compression)
        })?;

        let diff = ctx.stage(Stage::Difference, ErrorKind::ShapeMismatch, || {
            compute_difference(&original, &round_trip)
        })?;
        drop(round_trip);
        drop(original);

        ctx.check_deadline(Stage::Normalize)?;
        let normalized = normalize(&diff, config.amplification, config.score_statistic);
        let stats = ErrorLevelStats::from_diff(&diff);
        drop(diff);

        let artifact = ctx.stage(Stage::Render, ErrorKind::Encode, || {
            render(
                &normalized.buffer,
                config.heatmap_style,
                config.artifact_format,
            )
        })?;
        ctx.check_deadline("returning the result")?;

        let assessment = stats.assess(config.manipulation_threshold);
        let processing_duration = ctx.started.elapsed();
        tracing::info!(
            score = normalized.score,
            verdict = assessment.verdict.label(),
            lossy_source = decoded.format.is_lossy(),
            elapsed_ms = processing_duration.as_millis() as u64,
            "analysis complete"
        );

        Ok(AnalysisResult {
            request_id: self.request_id.clone(),
            source_format: decoded.format,
            content_type: artifact.content_type(),
            anomaly_score: normalized.score,
            max_magnitude: normalized.max_magnitude,
            stats,
            assessment,
            processing_duration,
            artifact,
        })
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.shared.in_flight.leave();
    }
}

/// Per-request state that lives for one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Identifier echoed in every result and error.
    pub request_id: &'a str,
    /// Admission time.
    pub started: Instant,
    /// Deadline for the whole chain.
    pub deadline: Instant,
    /// The uploaded bytes.
    pub bytes: &'a [u8],
}

impl RequestContext<'_> {
    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn check_deadline(&self, before: impl fmt::Display) -> Result<(), AnalysisError> {
        if Instant::now() < self.deadline {
            return Ok(());
        }
        let budget = self.deadline.saturating_duration_since(self.started);
        Err(self.fail(
            ErrorKind::Timeout,
            format!(
                "deadline of {} ms exceeded before {before}",
                budget.as_millis()
            ),
        ))
    }

    fn stage<T, E: fmt::Display>(
        &self,
        stage: Stage,
        kind: ErrorKind,
        run: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, AnalysisError> {
        self.check_deadline(stage)?;
        let start = Instant::now();
        let out = run().map_err(|err| self.fail(kind, err.to_string()))?;
        tracing::debug!(
            stage = stage.as_str(),
            elapsed_us = start.elapsed().as_micros() as u64,
            remaining_ms = self.remaining().as_millis() as u64,
            "stage complete"
        );
        Ok(out)
    }

    fn fail(&self, kind: ErrorKind, message: String) -> AnalysisError {
        if kind.is_internal() {
            tracing::error!(error_kind = kind.as_str(), %message, "pipeline invariant violated");
        } else {
            tracing::warn!(error_kind = kind.as_str(), %message, "analysis failed");
        }
        AnalysisError::new(self.request_id, kind, message)
    }
}

/// Outcome of a successful analysis.
///
/// Serializes to the caller-facing summary; the artifact bytes are left out
/// and must be handed off separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    /// Identifier of the request.
    pub request_id: String,
    /// Format the upload was decoded as.
    pub source_format: ImageFormat,
    /// MIME type of the artifact.
    pub content_type: &'static str,
    /// Anomaly score in 0.0..=1.0.
    pub anomaly_score: f64,
    /// Largest raw error magnitude.
    pub max_magnitude: u16,
    /// Error-level statistics.
    pub stats: ErrorLevelStats,
    /// Verdict derived from `stats`.
    pub assessment: Assessment,
    /// Wall time from admission to completion.
    #[serde(rename = "processing_duration_ms", serialize_with = "as_millis")]
    pub processing_duration: Duration,
    /// Encoded heatmap.
    #[serde(skip)]
    pub artifact: Artifact,
}

impl AnalysisResult {
    /// Processing time in milliseconds.
    pub fn processing_duration_ms(&self) -> f64 {
        self.processing_duration.as_secs_f64() * 1000.0
    }

    /// Heatmap width and height.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.artifact.width, self.artifact.height)
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ExtendedColorType, ImageEncoder};

    fn png_gradient(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 3) as u8, (y * 5) as u8, ((x ^ y) * 7) as u8]);
            }
        }
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(&data, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn slots_are_released_on_drop() {
        let analyzer = Analyzer::new(AnalyzerConfig::new().with_max_in_flight(2)).unwrap();
        let a = analyzer.admit(None).unwrap();
        let b = analyzer.admit(None).unwrap();
        assert_eq!(analyzer.in_flight(), 2);
        let err = analyzer.admit(Some("third".into())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Capacity);
        assert_eq!(err.request_id, "third");
        drop(a);
        let c = analyzer.admit(None).unwrap();
        drop((b, c));
        assert_eq!(analyzer.in_flight(), 0);
        assert_eq!(analyzer.peak_in_flight(), 2);
    }

    #[test]
    fn generated_ids_have_fixed_shape() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let admission = analyzer.admit(None).unwrap();
        let id = admission.request_id();
        assert_eq!(id.len(), 4 + 16);
        assert!(id.starts_with("req-"));
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn caller_id_is_echoed() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let result = analyzer
            .analyze(&png_gradient(24, 16), Some("upload-7".into()))
            .unwrap();
        assert_eq!(result.request_id, "upload-7");
        assert_eq!(result.dimensions(), (24, 16));
        assert_eq!(result.source_format, ImageFormat::Png);
        assert!((0.0..=1.0).contains(&result.anomaly_score));
    }

    #[test]
    fn expired_deadline_is_a_timeout() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let err = analyzer
            .admit(Some("late".into()))
            .unwrap()
            .with_timeout(Duration::ZERO)
            .run(&png_gradient(8, 8))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.message.contains("before decode"), "{}", err.message);
        assert_eq!(analyzer.in_flight(), 0);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let now = Instant::now();
        let ctx = RequestContext {
            request_id: "r",
            started: now,
            deadline: now,
            bytes: &[],
        };
        assert_eq!(ctx.remaining(), Duration::ZERO);
        assert!(ctx.check_deadline(Stage::Render).is_err());

        let ctx = RequestContext {
            deadline: now + Duration::from_secs(60),
            ..ctx
        };
        assert!(ctx.remaining() > Duration::from_secs(59));
        assert!(ctx.check_deadline(Stage::Render).is_ok());
    }

    #[test]
    fn with_timeout_never_extends() {
        let analyzer = Analyzer::new(
            AnalyzerConfig::new().with_timeout(Duration::from_millis(50)),
        )
        .unwrap();
        let admission = analyzer.admit(None).unwrap();
        let deadline = admission.deadline();
        let admission = admission.with_timeout(Duration::from_secs(60));
        assert_eq!(admission.deadline(), deadline);
    }

    #[test]
    fn decode_failure_maps_to_decode_kind() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let err = analyzer.analyze(b"not an image", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.kind.status_code(), 400);
        assert!(err.request_id.starts_with("req-"));
    }

    #[test]
    fn result_json_omits_bytes() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let result = analyzer.analyze(&png_gradient(16, 16), None).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content_type"], "image/png");
        assert_eq!(json["source_format"], "png");
        assert!(json["processing_duration_ms"].is_number());
        assert!(json.get("artifact").is_none());
        assert!(json["assessment"]["verdict"].is_string());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Analyzer::new(AnalyzerConfig::new().with_quality(101)).unwrap_err();
        assert_eq!(err, ConfigError::Quality(101));
    }
}
