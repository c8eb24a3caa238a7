//! MP4 assembly through the system `ffmpeg` binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;

/// How the frame sequence becomes a video.
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    pub fps: u32,
    pub frames_dir: PathBuf,
    pub out_path: PathBuf,
    /// Frame side length; yuv420p needs it even.
    pub resolution: u32,
}

impl EncodeConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.fps > 0, "fps must be non-zero");
        anyhow::ensure!(
            self.resolution > 0 && self.resolution.is_multiple_of(2),
            "resolution must be even for yuv420p output, got {}",
            self.resolution
        );
        Ok(())
    }

    /// Arguments passed to `ffmpeg`.
    pub fn args(&self) -> Vec<OsString> {
        let pattern = self.frames_dir.join("frame_%06d.png");
        vec![
            "-framerate".into(),
            self.fps.to_string().into(),
            "-i".into(),
            pattern.into_os_string(),
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-y".into(),
            self.out_path.clone().into_os_string(),
        ]
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

pub fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Run ffmpeg over the frames in `cfg.frames_dir`.
pub fn encode(cfg: &EncodeConfig) -> anyhow::Result<()> {
    cfg.validate()?;
    ensure_parent_dir(&cfg.out_path)?;
    anyhow::ensure!(
        is_ffmpeg_on_path(),
        "ffmpeg is required for MP4 encoding, but was not found on PATH"
    );

    tracing::info!(out = %cfg.out_path.display(), fps = cfg.fps, "encoding video");
    let output = Command::new("ffmpeg")
        .args(cfg.args())
        .stdin(Stdio::null())
        .output()
        .context("failed to spawn ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg failed ({}): {}", output.status, stderr.trim());
    }
    Ok(())
}
