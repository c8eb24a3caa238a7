//! strung-replay: render a thread sequence as a build-up video.
//!
//! Reads a `result.json` written by `strung`, redraws the lines one at a
//! time into numbered PNG frames, and assembles them into an MP4 with the
//! system `ffmpeg`.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin strung-replay -- [OPTIONS] <JSON_PATH>
//! ```
//!
//! The nail layout is re-derived from the document's `nail_count` and the
//! resolution and margin given here. Use the same values the sequence was
//! optimized with, otherwise the video shows a differently scaled piece.

#![allow(clippy::print_stderr)]

mod encode;
mod replay;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use strung_pipeline::{GenerationParams, PassConfig};

use crate::encode::EncodeConfig;
use crate::replay::{FrameSchedule, Replayer};

/// Frame size used when neither the document nor `--resolution` gives one.
const FALLBACK_RESOLUTION: u32 = 360;

/// Thread-sequence video renderer.
#[derive(Parser, Debug)]
#[command(name = "strung-replay", version)]
struct Cli {
    /// Path to the thread document (`result.json`).
    json_path: PathBuf,

    /// Output video path.
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// Frames per second of the video.
    #[arg(long, default_value_t = 30, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    fps: u32,

    /// Directory for the intermediate PNG frames.
    #[arg(long, default_value = "video_frames")]
    frames_dir: PathBuf,

    /// Capture one frame every N lines.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    frame_skip: usize,

    /// Frame side length in pixels [default: the document's resolution, else 360].
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    resolution: Option<u32>,

    /// Inward distance in pixels between the frame edge and the nail circle.
    #[arg(long, default_value_t = GenerationParams::DEFAULT_NAIL_MARGIN)]
    nail_margin: f64,

    /// Per-line opacity.
    #[arg(long, default_value_t = PassConfig::FINE.line_alpha)]
    line_alpha: f64,

    /// Keep the PNG frames after encoding.
    #[arg(long)]
    keep_frames: bool,

    /// Only write the frames; do not run ffmpeg.
    #[arg(long)]
    frames_only: bool,
}

impl Cli {
    fn resolution_for(&self, document_resolution: Option<u32>) -> u32 {
        self.resolution
            .or(document_resolution)
            .unwrap_or(FALLBACK_RESOLUTION)
    }

    fn validate(&self, resolution: u32) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.line_alpha > 0.0 && self.line_alpha <= 1.0,
            "line alpha must be in (0, 1], got {}",
            self.line_alpha
        );
        anyhow::ensure!(
            self.nail_margin >= 0.0 && f64::from(resolution) / 2.0 - self.nail_margin > 0.0,
            "nail margin {} leaves no room for nails at resolution {resolution}",
            self.nail_margin
        );
        Ok(())
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&cli.json_path)
        .with_context(|| format!("read '{}'", cli.json_path.display()))?;
    let document = strung_export::from_json(&json)
        .with_context(|| format!("parse '{}'", cli.json_path.display()))?;

    let resolution = cli.resolution_for(document.resolution);
    cli.validate(resolution)?;
    tracing::info!(
        nails = document.nail_count,
        lines = document.total_lines,
        resolution,
        "loaded thread sequence"
    );

    let mut replayer = Replayer::new(
        document.nail_count,
        resolution,
        cli.nail_margin,
        cli.line_alpha,
    );
    let schedule = FrameSchedule {
        frame_skip: cli.frame_skip,
    };
    replay::write_frames(&document, &mut replayer, schedule, &cli.frames_dir)?;

    if cli.frames_only {
        tracing::info!(dir = %cli.frames_dir.display(), "frames kept, skipping video");
        return Ok(());
    }

    encode::encode(&EncodeConfig {
        fps: cli.fps,
        frames_dir: cli.frames_dir.clone(),
        out_path: cli.output.clone(),
        resolution,
    })?;
    tracing::info!(path = %cli.output.display(), "video saved");

    if !cli.keep_frames {
        std::fs::remove_dir_all(&cli.frames_dir)
            .with_context(|| format!("remove frames dir '{}'", cli.frames_dir.display()))?;
        tracing::debug!(dir = %cli.frames_dir.display(), "frames removed");
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("strung-replay").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let cli = parse(&["result.json"]);
        assert_eq!(cli.output, PathBuf::from("output.mp4"));
        assert_eq!(cli.frames_dir, PathBuf::from("video_frames"));
        assert_eq!(cli.fps, 30);
        assert_eq!(cli.frame_skip, 1);
        assert!((cli.line_alpha - 0.1).abs() < f64::EPSILON);
        assert!((cli.nail_margin - 5.0).abs() < f64::EPSILON);
        assert!(!cli.keep_frames);
    }

    #[test]
    fn resolution_prefers_flag_then_document() {
        assert_eq!(parse(&["r.json", "--resolution", "200"]).resolution_for(Some(100)), 200);
        assert_eq!(parse(&["r.json"]).resolution_for(Some(100)), 100);
        assert_eq!(parse(&["r.json"]).resolution_for(None), FALLBACK_RESOLUTION);
    }

    #[test]
    fn zero_frame_skip_is_rejected_by_clap() {
        assert!(Cli::try_parse_from(["strung-replay", "r.json", "--frame-skip", "0"]).is_err());
    }

    #[test]
    fn oversized_margin_is_rejected() {
        let cli = parse(&["r.json", "--nail-margin", "60"]);
        assert!(cli.validate(100).is_err());
        assert!(cli.validate(360).is_ok());
    }

    #[test]
    fn frames_only_run_writes_frames() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("result.json");
        std::fs::write(
            &json_path,
            r#"{"nail_count": 12, "total_lines": 3, "resolution": 40, "thread_sequence": [0, 6, 2, 9]}"#,
        )
        .unwrap();
        let frames = dir.path().join("frames");

        let cli = parse(&[
            json_path.to_str().unwrap(),
            "--frames-dir",
            frames.to_str().unwrap(),
            "--frames-only",
        ]);
        run(&cli).unwrap();

        // One frame per line plus the final frame.
        let count = std::fs::read_dir(&frames).unwrap().count();
        assert_eq!(count, 4);
        let last = image::open(replay::frame_path(&frames, 3)).unwrap().to_luma8();
        assert_eq!(last.dimensions(), (40, 40));
        assert!(last.pixels().any(|p| p.0[0] > 0));
    }
}
