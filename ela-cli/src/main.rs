//! ela CLI - Error Level Analysis for images
//!
//! Analyze one image or a directory of images and write ELA heatmaps.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use clap::{ArgAction, ColorChoice, Parser, ValueEnum};
use colored::Colorize;
use ela::{
    Amplification, AnalysisResult, Analyzer, AnalyzerConfig, ArtifactFormat, HeatmapStyle,
    ImageFormat, ScoreStatistic, Verdict,
};
use serde::Serialize;

/// Error Level Analysis
///
/// Re-encodes an image as JPEG at a fixed quality and maps where the result
/// differs from the input. Regions edited after the image was last saved
/// tend to show a higher error level than the rest of the picture.
///
/// The anomaly score lies in 0.0..=1.0; 0 means the round trip was lossless.
#[derive(Parser, Debug)]
#[command(name = "ela")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    Analyze one image:
        ela photo.jpg

    Write the heatmap and show the full report:
        ela --heatmap photo.ela.png --format report photo.jpg

    CI mode - fail if the score exceeds a threshold:
        ela --max-score 0.1 photo.jpg

    Analyze a directory with 4 workers and write heatmaps next to each other:
        ela --jobs 4 --out-dir heatmaps/ uploads/

    Output JSON for scripting:
        ela --json photo.jpg

    Load settings from a file, then override the quality:
        ela --config ela.json --quality 85 photo.jpg

EXIT CODES:
    0 - Success (score within threshold if --max-score specified)
    1 - Score exceeded threshold (--max-score)
    2 - Error (file not found, invalid image, invalid configuration, etc.)

LOGGING:
    Set RUST_LOG (e.g. RUST_LOG=ela=debug) for per-stage timings on stderr.")]
struct Cli {
    /// Image file, or a directory to analyze every image in it
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output JSON (shorthand for --format json)
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Show verdict and error-level statistics (shorthand for --format report)
    #[arg(short, long, conflicts_with = "format")]
    report: bool,

    /// Quiet mode - only output the score number
    #[arg(long, short = 's', action = ArgAction::SetTrue)]
    quiet: bool,

    /// Save the heatmap of a single input to this file
    #[arg(short = 'H', long, value_name = "FILE")]
    heatmap: Option<PathBuf>,

    /// Save heatmaps into this directory as <name>.ela.<ext>
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Maximum acceptable anomaly score (exit code 1 if exceeded)
    #[arg(long, value_name = "SCORE")]
    max_score: Option<f64>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JPEG quality of the controlled re-encode (1-100, default 90)
    #[arg(long, value_name = "Q")]
    quality: Option<u8>,

    /// Statistic behind the anomaly score
    #[arg(long, value_enum)]
    statistic: Option<StatisticArg>,

    /// Percentile for the percentile statistic (default 99)
    #[arg(long, value_name = "P")]
    percentile: Option<f64>,

    /// Use a fixed brightness gain instead of a full-range stretch
    #[arg(long, value_name = "GAIN")]
    gain: Option<f32>,

    /// Heatmap style
    #[arg(long, value_enum)]
    style: Option<StyleArg>,

    /// Heatmap file format
    #[arg(long, value_enum)]
    artifact: Option<ArtifactArg>,

    /// Mean error level above which an image is reported as manipulated
    #[arg(long, value_name = "LEVEL")]
    threshold: Option<f64>,

    /// Per-image deadline in milliseconds
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Largest accepted width or height in pixels
    #[arg(long, value_name = "PIXELS")]
    max_dimension: Option<u32>,

    /// Number of images analyzed concurrently in directory mode
    #[arg(short, long, default_value = "1", value_name = "N")]
    jobs: usize,

    /// File extensions to include in directory mode (comma-separated)
    #[arg(
        long,
        default_value = "png,jpg,jpeg,webp,gif,bmp,tif,tiff",
        value_delimiter = ','
    )]
    extensions: Vec<String>,

    /// Control color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,

    /// Continue on errors in directory mode
    #[arg(long)]
    keep_going: bool,

    /// Show summary statistics in directory mode
    #[arg(long)]
    summary: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Plain text output with score
    Text,
    /// JSON output with all metrics
    Json,
    /// Score, verdict and error-level statistics (with colors)
    Report,
    /// Minimal - just the score number
    Score,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StatisticArg {
    /// High percentile of the raw error (robust to isolated noise)
    Percentile,
    /// Largest raw error (most sensitive)
    Maximum,
    /// Mean raw error
    Mean,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StyleArg {
    /// Amplified error per channel
    Ela,
    /// Amplified error luminance
    Grayscale,
    /// Blue-to-red ramp over the error luminance
    Colormap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ArtifactArg {
    Png,
    Jpeg,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    input: String,
    width: u32,
    height: u32,
    source_mime_type: &'static str,
    #[serde(flatten)]
    result: &'a AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    heatmap: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold_exceeded: Option<bool>,
}

#[derive(Serialize)]
struct JsonError {
    input: String,
    error: String,
}

#[derive(Serialize)]
struct BatchJsonOutput<'a> {
    results: Vec<JsonOutput<'a>>,
    errors: Vec<JsonError>,
    summary: BatchSummary,
}

#[derive(Serialize)]
struct BatchSummary {
    total: usize,
    passed: usize,
    failed: usize,
    errors: usize,
    manipulated: usize,
    min_score: f64,
    max_score: f64,
    mean_score: f64,
}

struct FileResult {
    input: PathBuf,
    heatmap: Option<PathBuf>,
    result: Result<AnalysisResult, String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    setup_colors(&cli);

    let analyzer = match build_config(&cli).and_then(|config| {
        Analyzer::new(config).map_err(|e| format!("invalid configuration: {e}"))
    }) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    if cli.input.is_dir() {
        run_batch(&cli, &analyzer)
    } else {
        run_single(&cli, &analyzer)
    }
}

fn setup_colors(cli: &Cli) {
    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

fn build_config(cli: &Cli) -> Result<AnalyzerConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to read config '{}': {e}", path.display()))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("invalid config '{}': {e}", path.display()))?
        }
        None => AnalyzerConfig::default(),
    };

    if let Some(quality) = cli.quality {
        config = config.with_quality(quality);
    }
    match (cli.statistic, cli.percentile) {
        (Some(StatisticArg::Maximum), _) => {
            config = config.with_score_statistic(ScoreStatistic::Maximum);
        }
        (Some(StatisticArg::Mean), _) => {
            config = config.with_score_statistic(ScoreStatistic::Mean);
        }
        (Some(StatisticArg::Percentile), p) => {
            let p = p.unwrap_or(ela::normalize::DEFAULT_PERCENTILE);
            config = config.with_score_statistic(ScoreStatistic::Percentile(p));
        }
        (None, Some(p)) => config = config.with_score_statistic(ScoreStatistic::Percentile(p)),
        (None, None) => {}
    }
    if let Some(gain) = cli.gain {
        config = config.with_amplification(Amplification::Brightness { gain });
    }
    if let Some(style) = cli.style {
        config = config.with_heatmap_style(match style {
            StyleArg::Ela => HeatmapStyle::Ela,
            StyleArg::Grayscale => HeatmapStyle::Grayscale,
            StyleArg::Colormap => HeatmapStyle::Colormap,
        });
    }
    if let Some(artifact) = cli.artifact {
        config = config.with_artifact_format(match artifact {
            ArtifactArg::Png => ArtifactFormat::Png,
            ArtifactArg::Jpeg => ArtifactFormat::Jpeg,
        });
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_manipulation_threshold(threshold);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    if let Some(max) = cli.max_dimension {
        config = config.with_max_dimensions(max, max);
    }
    Ok(config)
}

fn get_format(cli: &Cli) -> OutputFormat {
    if cli.json {
        OutputFormat::Json
    } else if cli.report {
        OutputFormat::Report
    } else if cli.quiet {
        OutputFormat::Score
    } else {
        cli.format
    }
}

/// Reads and analyzes one file, backing off while the analyzer is at capacity.
fn analyze_file(analyzer: &Analyzer, path: &Path) -> Result<AnalysisResult, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    let request_id = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let hint = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension);

    loop {
        match analyzer.admit(request_id.clone()) {
            Ok(admission) => {
                let admission = match hint {
                    Some(format) => admission.with_format_hint(format),
                    None => admission,
                };
                return admission.run(&bytes).map_err(|e| e.to_string());
            }
            Err(e) if e.kind.is_retryable() => thread::sleep(Duration::from_millis(5)),
            Err(e) => return Err(e.to_string()),
        }
    }
}

fn heatmap_path(cli: &Cli, input: &Path, format: ArtifactFormat) -> Option<PathBuf> {
    if let Some(path) = &cli.heatmap {
        return Some(path.clone());
    }
    let dir = cli.out_dir.as_ref()?;
    let stem = input.file_stem()?.to_string_lossy();
    Some(dir.join(format!("{stem}.ela.{}", format.extension())))
}

fn save_heatmap(result: &AnalysisResult, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create '{}': {e}", parent.display()))?;
    }
    fs::write(path, &result.artifact.bytes)
        .map_err(|e| format!("failed to save heatmap '{}': {e}", path.display()))
}

fn run_single(cli: &Cli, analyzer: &Analyzer) -> ExitCode {
    let result = match analyze_file(analyzer, &cli.input) {
        Ok(result) => result,
        Err(e) => {
            if !cli.quiet {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            return ExitCode::from(2);
        }
    };

    let heatmap = heatmap_path(cli, &cli.input, analyzer.config().artifact_format);
    if let Some(path) = &heatmap {
        if let Err(e) = save_heatmap(&result, path) {
            if !cli.quiet {
                eprintln!("{}: {}", "error".red().bold(), e);
            }
            return ExitCode::from(2);
        }
        if !cli.quiet && get_format(cli) != OutputFormat::Json {
            eprintln!("Heatmap saved to: {}", path.display());
        }
    }

    if let Err(e) = output_single_result(cli, &result, heatmap.as_deref()) {
        if !cli.quiet {
            eprintln!("{}: {}", "error".red().bold(), e);
        }
        return ExitCode::from(2);
    }

    if let Some(max_score) = cli.max_score {
        if result.anomaly_score > max_score {
            return ExitCode::from(1);
        }
    }
    ExitCode::SUCCESS
}

fn run_batch(cli: &Cli, analyzer: &Analyzer) -> ExitCode {
    if cli.heatmap.is_some() {
        eprintln!(
            "{}: --heatmap takes a single image; use --out-dir with a directory",
            "error".red().bold()
        );
        return ExitCode::from(2);
    }

    let files = match find_images(&cli.input, &cli.extensions) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return ExitCode::from(2);
        }
    };

    if files.is_empty() {
        eprintln!("{}: no image files found", "warning".yellow().bold());
        return ExitCode::from(2);
    }

    tracing::info!(files = files.len(), jobs = cli.jobs, "starting batch");
    let results = analyze_all(cli, analyzer, &files);

    if !cli.keep_going {
        if let Some(fr) = results.iter().find(|fr| fr.result.is_err()) {
            if let Err(e) = &fr.result {
                eprintln!("{}: {}: {}", "error".red().bold(), fr.input.display(), e);
            }
            return ExitCode::from(2);
        }
    }

    if let Err(e) = output_batch_results(cli, &results) {
        eprintln!("{}: {}", "error".red().bold(), e);
        return ExitCode::from(2);
    }

    let threshold_exceeded = cli.max_score.is_some_and(|max| {
        results
            .iter()
            .any(|fr| fr.result.as_ref().is_ok_and(|r| r.anomaly_score > max))
    });
    let had_errors = results.iter().any(|fr| fr.result.is_err());

    if threshold_exceeded {
        ExitCode::from(1)
    } else if had_errors {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    }
}

fn find_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, String> {
    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    let entries = fs::read_dir(dir)
        .map_err(|e| format!("failed to read directory '{}': {e}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| format!("failed to read directory entry: {e}"))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if extensions.contains(&ext) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Runs `f`, turning a panic into an error for `input`.
fn catch_panic<T>(input: &Path, f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|_| Err(format!("analysis of '{}' panicked", input.display())))
}

/// Runs `--jobs` workers over `files`, all sharing one analyzer. Results come
/// back in input order; files skipped after a failure without `--keep-going`
/// have no entry.
fn analyze_all(cli: &Cli, analyzer: &Analyzer, files: &[PathBuf]) -> Vec<FileResult> {
    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let format = analyzer.config().artifact_format;

    let worker = || {
        let mut done = Vec::new();
        while !stop.load(Ordering::Relaxed) {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(input) = files.get(index) else {
                break;
            };
            let heatmap = heatmap_path(cli, input, format);
            let result = catch_panic(input, || {
                let result = analyze_file(analyzer, input)?;
                if let Some(path) = &heatmap {
                    save_heatmap(&result, path)?;
                }
                Ok(result)
            });
            if result.is_err() && !cli.keep_going {
                stop.store(true, Ordering::Relaxed);
            }
            done.push((index, heatmap, result));
        }
        done
    };

    let mut slots: Vec<Option<(Option<PathBuf>, Result<AnalysisResult, String>)>> =
        files.iter().map(|_| None).collect();
    thread::scope(|scope| {
        let handles: Vec<_> = (0..cli.jobs.max(1)).map(|_| scope.spawn(worker)).collect();
        for handle in handles {
            let done = match handle.join() {
                Ok(done) => done,
                Err(payload) => panic::resume_unwind(payload),
            };
            for (index, heatmap, result) in done {
                slots[index] = Some((heatmap, result));
            }
        }
    });

    files
        .iter()
        .zip(slots)
        .filter_map(|(input, slot)| {
            slot.map(|(heatmap, result)| FileResult {
                input: input.clone(),
                heatmap,
                result,
            })
        })
        .collect()
}

fn verdict_color(verdict: Verdict) -> colored::Color {
    match verdict {
        Verdict::LikelyAuthentic => colored::Color::Green,
        Verdict::LikelyManipulated => colored::Color::Red,
    }
}

fn json_output<'a>(
    cli: &Cli,
    input: &Path,
    result: &'a AnalysisResult,
    heatmap: Option<&Path>,
) -> JsonOutput<'a> {
    let (width, height) = result.dimensions();
    JsonOutput {
        input: input.display().to_string(),
        width,
        height,
        source_mime_type: result.source_format.mime_type(),
        result,
        heatmap: heatmap.map(|p| p.display().to_string()),
        threshold_exceeded: cli.max_score.map(|max| result.anomaly_score > max),
    }
}

fn output_single_result(
    cli: &Cli,
    result: &AnalysisResult,
    heatmap: Option<&Path>,
) -> Result<(), String> {
    let color = verdict_color(result.assessment.verdict);
    let score_str = format!("{:.4}", result.anomaly_score);

    match get_format(cli) {
        OutputFormat::Score => {
            println!("{:.6}", result.anomaly_score);
        }
        OutputFormat::Text => match cli.max_score {
            Some(max_score) if result.anomaly_score > max_score => {
                println!(
                    "ELA score: {} (exceeds threshold {})",
                    score_str.color(color),
                    max_score
                );
            }
            _ => println!("ELA score: {}", score_str.color(color)),
        },
        OutputFormat::Report => {
            let assessment = result.assessment;
            let stats = &result.stats;
            let (width, height) = result.dimensions();
            println!(
                "ELA score: {} ({}, {}% certainty)",
                score_str.color(color),
                assessment.verdict.label().color(color).bold(),
                assessment.certainty
            );
            println!(
                "Error level: mean {:.2}  std {:.2}  high variance {:.1}%  edge density {:.2}",
                stats.mean, stats.std_dev, stats.high_variance_percent, stats.edge_density
            );
            println!(
                "Max error: {}  Size: {}x{}  Source: {} ({})  Time: {:.1} ms",
                result.max_magnitude,
                width,
                height,
                result.source_format,
                result.source_format.mime_type(),
                result.processing_duration_ms()
            );
            if !result.source_format.is_lossy() {
                println!("{}", "Note: lossless source".dimmed());
            }

            if let Some(max_score) = cli.max_score {
                if result.anomaly_score > max_score {
                    println!(
                        "{}",
                        format!(
                            "Threshold exceeded: {:.4} > {}",
                            result.anomaly_score, max_score
                        )
                        .red()
                        .bold()
                    );
                } else {
                    println!(
                        "{}",
                        format!(
                            "Threshold passed: {:.4} <= {}",
                            result.anomaly_score, max_score
                        )
                        .green()
                    );
                }
            }
        }
        OutputFormat::Json => {
            let output = json_output(cli, &cli.input, result, heatmap);
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("failed to serialize JSON: {e}"))?;
            println!("{json}");
        }
    }

    Ok(())
}

fn output_batch_results(cli: &Cli, results: &[FileResult]) -> Result<(), String> {
    let mut scores: Vec<f64> = Vec::new();
    let mut passed = 0;
    let mut failed = 0;
    let mut errors = 0;
    let mut manipulated = 0;

    for fr in results {
        match &fr.result {
            Ok(result) => {
                scores.push(result.anomaly_score);
                if cli.max_score.is_some_and(|max| result.anomaly_score > max) {
                    failed += 1;
                } else {
                    passed += 1;
                }
                if result.assessment.verdict == Verdict::LikelyManipulated {
                    manipulated += 1;
                }
            }
            Err(_) => errors += 1,
        }
    }

    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_score = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    match get_format(cli) {
        OutputFormat::Json => {
            let mut json_results = Vec::new();
            let mut json_errors = Vec::new();
            for fr in results {
                match &fr.result {
                    Ok(result) => json_results.push(json_output(
                        cli,
                        &fr.input,
                        result,
                        fr.heatmap.as_deref(),
                    )),
                    Err(e) => json_errors.push(JsonError {
                        input: fr.input.display().to_string(),
                        error: e.clone(),
                    }),
                }
            }

            let batch_output = BatchJsonOutput {
                results: json_results,
                errors: json_errors,
                summary: BatchSummary {
                    total: results.len(),
                    passed,
                    failed,
                    errors,
                    manipulated,
                    min_score: if min_score.is_finite() { min_score } else { 0.0 },
                    max_score: if max_score.is_finite() { max_score } else { 0.0 },
                    mean_score,
                },
            };

            let json = serde_json::to_string_pretty(&batch_output)
                .map_err(|e| format!("failed to serialize JSON: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Score => {
            for fr in results {
                if let Ok(result) = &fr.result {
                    println!("{:.6}", result.anomaly_score);
                }
            }
        }
        OutputFormat::Text | OutputFormat::Report => {
            let name_width = results
                .iter()
                .map(|fr| fr.input.file_name().unwrap_or_default().len())
                .max()
                .unwrap_or(20);

            for fr in results {
                let filename = fr
                    .input
                    .file_name()
                    .and_then(|s| s.to_str())
                    .unwrap_or("?");

                match &fr.result {
                    Ok(result) => {
                        let verdict = result.assessment.verdict;
                        let color = verdict_color(verdict);
                        let score_str = format!("{:.4}", result.anomaly_score);

                        let status = match cli.max_score {
                            Some(max) if result.anomaly_score > max => "FAIL".red().bold(),
                            Some(_) => "PASS".green().bold(),
                            None => verdict.label().color(color).bold(),
                        };

                        println!(
                            "{:width$}  {:>8}  {}",
                            filename,
                            score_str.color(color),
                            status,
                            width = name_width
                        );
                        if get_format(cli) == OutputFormat::Report {
                            let stats = &result.stats;
                            println!(
                                "{:width$}  {}, {}% certainty; mean {:.2}  std {:.2}  high variance {:.1}%  edge density {:.2}",
                                "",
                                verdict.label(),
                                result.assessment.certainty,
                                stats.mean,
                                stats.std_dev,
                                stats.high_variance_percent,
                                stats.edge_density,
                                width = name_width
                            );
                        }
                    }
                    Err(e) => {
                        println!(
                            "{:width$}  {:>8}  {}",
                            filename,
                            "-".dimmed(),
                            format!("ERROR: {e}").red(),
                            width = name_width
                        );
                    }
                }
            }

            if cli.summary || results.len() > 1 {
                println!();
                println!("{}", "Summary:".bold());
                println!(
                    "  Total: {}  Passed: {}  Failed: {}  Errors: {}  Manipulated: {}",
                    results.len(),
                    passed.to_string().green(),
                    if failed > 0 {
                        failed.to_string().red()
                    } else {
                        failed.to_string().normal()
                    },
                    if errors > 0 {
                        errors.to_string().red()
                    } else {
                        errors.to_string().normal()
                    },
                    manipulated
                );
                if !scores.is_empty() {
                    println!(
                        "  Scores: min={min_score:.4}  max={max_score:.4}  mean={mean_score:.4}"
                    );
                }
            }
        }
    }

    let _ = io::stdout().flush();

    Ok(())
}
