//! strung: turn an image into a string-art thread sequence.
//!
//! Runs the two-pass pipeline (coarse exploratory pass, then the fine pass
//! that is exported) on an input image and writes the results into an
//! output directory:
//!
//! - `result.json`: nail count, line count and the continuous thread path
//! - `result.png`: grayscale preview of the accumulated thread
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin strung -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=strung_pipeline=debug` to see cache builds and stop
//! reasons, or `trace` for every committed line.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use strung_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use strung_pipeline::{
    GenerationParams, GenerationResult, PassConfig, PipelineConfig, ResizeFilter, Scoring,
    StagedResult,
};

/// String-art generator.
///
/// Approximates the input image with straight thread segments strung
/// between nails evenly spaced on a circle.
#[derive(Parser, Debug)]
#[command(name = "strung", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Directory for `result.json` and `result.png` (created if missing).
    #[arg(short, long, default_value = "StringArtResults")]
    output_dir: PathBuf,

    /// Side length of the square working image in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    resolution: u32,

    /// Number of nails on the circle.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NAIL_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..))]
    nail_count: usize,

    /// Inward distance in pixels between the image edge and the nail circle.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NAIL_MARGIN)]
    nail_margin: f64,

    /// Iteration budget of the coarse pass.
    #[arg(long, default_value_t = PassConfig::COARSE.max_iterations)]
    coarse_iterations: usize,

    /// Per-line opacity of the coarse pass.
    #[arg(long, default_value_t = PassConfig::COARSE.line_alpha)]
    coarse_alpha: f64,

    /// Minimum nail gap of the coarse pass.
    #[arg(long, default_value_t = PassConfig::COARSE.min_gap)]
    coarse_gap: usize,

    /// Iteration budget of the fine pass.
    #[arg(long, default_value_t = PassConfig::FINE.max_iterations)]
    fine_iterations: usize,

    /// Per-line opacity of the fine pass.
    #[arg(long, default_value_t = PassConfig::FINE.line_alpha)]
    fine_alpha: f64,

    /// Minimum nail gap of the fine pass.
    #[arg(long, default_value_t = PassConfig::FINE.min_gap)]
    fine_gap: usize,

    /// Stop a pass once the best line improves the error by no more than this.
    #[arg(long, default_value_t = GenerationParams::DEFAULT_MIN_IMPROVEMENT)]
    min_improvement: f64,

    /// Filter used to stretch the image to the working resolution.
    #[arg(long, value_enum, default_value_t = Filter::Nearest)]
    resize_filter: Filter,

    /// Candidate scoring strategy.
    #[arg(long, value_enum, default_value_t = ScoringChoice::LineDelta)]
    scoring: ScoringChoice,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Skip writing `result.json`.
    #[arg(long)]
    no_json: bool,

    /// Skip writing `result.png`.
    #[arg(long)]
    no_png: bool,

    /// Write the PNG preview unmirrored.
    ///
    /// By default the preview is flipped horizontally, showing the board
    /// as seen from the back.
    #[arg(long)]
    no_mirror: bool,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    report: bool,

    /// Print diagnostics as JSON on stdout instead of the text summary.
    #[arg(long)]
    json: bool,
}

/// Resize filter selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Candidate scoring selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScoringChoice {
    /// Re-score the whole image for every candidate.
    FullImage,
    /// Score only the pixels each candidate line covers.
    LineDelta,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).context("parsing --config-json");
    }

    Ok(PipelineConfig {
        resolution: cli.resolution,
        nail_count: cli.nail_count,
        nail_margin: cli.nail_margin,
        resize_filter: match cli.resize_filter {
            Filter::Nearest => ResizeFilter::Nearest,
            Filter::Triangle => ResizeFilter::Triangle,
            Filter::CatmullRom => ResizeFilter::CatmullRom,
            Filter::Gaussian => ResizeFilter::Gaussian,
            Filter::Lanczos3 => ResizeFilter::Lanczos3,
        },
        scoring: match cli.scoring {
            ScoringChoice::FullImage => Scoring::FullImage,
            ScoringChoice::LineDelta => Scoring::LineDelta,
        },
        coarse: PassConfig {
            max_iterations: cli.coarse_iterations,
            line_alpha: cli.coarse_alpha,
            min_gap: cli.coarse_gap,
            min_improvement: cli.min_improvement,
        },
        fine: PassConfig {
            max_iterations: cli.fine_iterations,
            line_alpha: cli.fine_alpha,
            min_gap: cli.fine_gap,
            min_improvement: cli.min_improvement,
        },
    })
}

/// `[NNN%] label`, with the percentage truncated.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn format_progress(current: usize, total: usize, label: &str) -> String {
    let percent = if total == 0 {
        0
    } else {
        (current as f64 / total as f64 * 100.0) as u32
    };
    format!("[{percent:03}%] {label}")
}

/// Write the enabled outputs into `dir` and return their paths.
fn write_outputs(
    dir: &Path,
    result: &GenerationResult,
    resolution: u32,
    cli: &Cli,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output dir '{}'", dir.display()))?;

    let mut written = Vec::new();
    if !cli.no_json {
        let path = dir.join("result.json");
        let json = strung_export::to_json(result, resolution)?;
        std::fs::write(&path, json).with_context(|| format!("write '{}'", path.display()))?;
        written.push(path);
    }
    if !cli.no_png {
        let path = dir.join("result.png");
        let png = strung_export::to_png(&result.rendered, !cli.no_mirror)?;
        std::fs::write(&path, png).with_context(|| format!("write '{}'", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Print per-pass and final results.
fn print_summary(staged: &StagedResult) {
    for (name, result) in [("COARSE", &staged.coarse), ("FINE", &staged.fine)] {
        println!("=== {name} PASS ===");
        println!("Lines: {}", result.line_sequence.len());
        println!("MSE: {:.4}", result.metrics.mse);
        println!("RMSE: {:.4}", result.metrics.rmse);
        println!("Stopped: {}", result.stop_reason);
        println!();
    }

    let fine = staged.final_result();
    println!("=== FINAL RESULT ===");
    println!("Coarse Lines: {}", staged.coarse.line_sequence.len());
    println!("Fine Lines: {}", fine.line_sequence.len());
    println!("MSE: {:.4}", fine.metrics.mse);
    println!("RMSE: {:.4}", fine.metrics.rmse);
    println!("Coverage: {:.2}%", fine.metrics.coverage_percent);
    println!(
        "Total Time: {}ms",
        (staged.coarse.metrics.elapsed + fine.metrics.elapsed).as_millis()
    );
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config_from_cli(cli)?;
    config.validate()?;

    let image_bytes = std::fs::read(&cli.image_path)
        .with_context(|| format!("read image '{}'", cli.image_path.display()))?;

    tracing::info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        output = %cli.output_dir.display(),
        "starting"
    );
    tracing::debug!(?config, "pipeline config");

    let mut progress = |current: usize, total: usize, label: &str| {
        tracing::info!("{}", format_progress(current, total, label));
    };
    let (staged, diagnostics): (StagedResult, PipelineDiagnostics) =
        strung_pipeline::diagnostics::process_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
            &mut progress,
        )?;

    for path in write_outputs(&cli.output_dir, staged.final_result(), config.resolution, cli)? {
        tracing::info!(path = %path.display(), "saved");
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        print_summary(&staged);
        if cli.report {
            println!();
            println!("{}", diagnostics.report());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
