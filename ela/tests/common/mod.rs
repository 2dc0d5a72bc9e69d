//! Common test utilities for ELA integration tests.

#![allow(dead_code)]

pub mod generators;

use ela::{Analyzer, AnalyzerConfig};

/// Analyzer with default settings and the given concurrency bound.
pub fn analyzer(max_in_flight: usize) -> Analyzer {
    Analyzer::new(AnalyzerConfig::new().with_max_in_flight(max_in_flight))
        .expect("valid test config")
}

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}
