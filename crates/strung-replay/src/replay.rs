//! Line-by-line reconstruction of a thread sequence.
//!
//! The nail layout is re-derived from `(nail_count, resolution, margin)`
//! and every line is looked up in a [`LineCache`] and blended exactly as
//! the optimizer commits it, so the last frame matches the exported
//! preview when the parameters agree.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use strung_export::ThreadDocument;
use strung_pipeline::{Dimensions, LineCache, LineConnection, RasterImage};

/// Accumulates thread intensity one line at a time.
pub struct Replayer {
    cache: LineCache,
    line_alpha: f64,
    canvas: RasterImage,
}

impl Replayer {
    pub fn new(nail_count: usize, resolution: u32, margin: f64, line_alpha: f64) -> Self {
        let mut cache = LineCache::new();
        cache.precompute_with_margin(nail_count, Dimensions::square(resolution), margin);
        Self {
            cache,
            line_alpha,
            canvas: RasterImage::new(resolution, resolution),
        }
    }

    /// Draw one line. Unknown nail ids draw nothing.
    pub fn apply(&mut self, line: &LineConnection) {
        self.canvas
            .blend_pixels(self.cache.get_line(line.from, line.to), self.line_alpha);
    }

    pub const fn canvas(&self) -> &RasterImage {
        &self.canvas
    }
}

/// How often frames are captured.
#[derive(Debug, Clone, Copy)]
pub struct FrameSchedule {
    /// Capture a frame after every `frame_skip` lines.
    pub frame_skip: usize,
}

impl FrameSchedule {
    /// Lines between progress log lines.
    const PROGRESS_FRAMES: usize = 50;

    const fn captures_after(self, lines_done: usize) -> bool {
        lines_done % self.frame_skip == 0
    }

    const fn reports_after(self, lines_done: usize) -> bool {
        lines_done % (self.frame_skip * Self::PROGRESS_FRAMES) == 0
    }
}

/// Path of frame `index` inside `dir`.
pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:06}.png"))
}

/// Replay `document` into `frames_dir`, writing a frame after every
/// `schedule.frame_skip` lines plus one final frame.
///
/// Returns the number of frames written.
pub fn write_frames(
    document: &ThreadDocument,
    replayer: &mut Replayer,
    schedule: FrameSchedule,
    frames_dir: &Path,
) -> anyhow::Result<usize> {
    anyhow::ensure!(schedule.frame_skip > 0, "frame skip must be positive");
    std::fs::create_dir_all(frames_dir)
        .with_context(|| format!("create frames dir '{}'", frames_dir.display()))?;

    let lines = document.connections();
    let total = lines.len();
    let mut frames = 0;

    for (i, line) in lines.iter().enumerate() {
        replayer.apply(line);
        let done = i + 1;
        if schedule.captures_after(done) {
            save_frame(replayer.canvas(), &frame_path(frames_dir, frames))?;
            frames += 1;
            if schedule.reports_after(done) {
                tracing::info!("[{:>3}%] {done} / {total} lines", percent(done, total));
            }
        }
    }

    save_frame(replayer.canvas(), &frame_path(frames_dir, frames))?;
    frames += 1;
    tracing::info!(frames, lines = total, "frames written");
    Ok(frames)
}

fn save_frame(canvas: &RasterImage, path: &Path) -> anyhow::Result<()> {
    let png = strung_export::to_png(canvas, false)?;
    std::fs::write(path, png).with_context(|| format!("write frame '{}'", path.display()))
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (done as f64 / total as f64 * 100.0) as u32
}
