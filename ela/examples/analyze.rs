//! Run ELA on one image and write the heatmap next to it.
//!
//! ```text
//! cargo run --release --example analyze -- photo.jpg [quality]
//! ```

use std::env;
use std::fs;
use std::path::Path;

use ela::{Analyzer, AnalyzerConfig, HeatmapStyle};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image> [quality]", args[0]);
        std::process::exit(1);
    }

    let quality = args
        .get(2)
        .map(|q| q.parse().unwrap_or_else(|e| panic!("bad quality {q}: {e}")))
        .unwrap_or(ela::recompress::DEFAULT_QUALITY);

    let config = AnalyzerConfig::new()
        .with_quality(quality)
        .with_heatmap_style(HeatmapStyle::Colormap);
    let analyzer = Analyzer::new(config).unwrap();

    let path = Path::new(&args[1]);
    let bytes = fs::read(path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    let result = analyzer.analyze(&bytes, None).unwrap_or_else(|e| panic!("{e}"));

    let out = path.with_extension(format!("ela.{}", result.artifact.format.extension()));
    fs::write(&out, &result.artifact.bytes).unwrap();

    let (w, h) = result.dimensions();
    println!("{}: {w}x{h} {}", path.display(), result.source_format);
    println!("anomaly score: {:.4}", result.anomaly_score);
    println!(
        "verdict:       {} ({}%)",
        result.assessment.verdict.label(),
        result.assessment.certainty
    );
    println!("heatmap:       {}", out.display());
}
