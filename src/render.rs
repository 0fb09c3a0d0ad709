use crate::clip::{Clip, Visual};
use crate::ffmpeg;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Encodes an ordered list of clips into one video file.
#[async_trait]
pub trait ReelRenderer: Send + Sync {
    async fn render(&self, clips: &[Clip], out_mp4: &Path, fps: u32) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct FfmpegRenderer;

/// Writes each text card's wrapped lines to its own file under `dir`.
pub async fn write_caption_files(clips: &[Clip], dir: &Path) -> Result<Vec<Option<PathBuf>>> {
    let mut files = Vec::with_capacity(clips.len());
    for clip in clips {
        match &clip.visual {
            Visual::TextCard { lines, .. } => {
                let path = dir.join(format!("caption_{}.txt", clip.index));
                fs::write(&path, lines.join("\n"))
                    .await
                    .with_context(|| format!("Failed to write caption {}", path.display()))?;
                files.push(Some(path));
            }
            Visual::Image { .. } => files.push(None),
        }
    }
    Ok(files)
}

#[async_trait]
impl ReelRenderer for FfmpegRenderer {
    async fn render(&self, clips: &[Clip], out_mp4: &Path, fps: u32) -> Result<()> {
        if clips.is_empty() {
            anyhow::bail!("nothing to render");
        }
        if let Some(parent) = out_mp4.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create dir {}", parent.display()))?;
            }
        }

        let workdir = tempfile::tempdir().context("Failed to create render workspace")?;
        let captions = write_caption_files(clips, workdir.path()).await?;

        let expected: f64 = clips.iter().map(|c| c.duration).sum();
        logi(format!(
            "Rendering {} clips ({:.2}s at {} fps) -> {}",
            clips.len(),
            expected,
            fps,
            out_mp4.display()
        ));
        if !ffmpeg::ffmpeg_render_reel(clips, &captions, fps, out_mp4).await? {
            anyhow::bail!("ffmpeg reported success but {} is missing", out_mp4.display());
        }

        match ffmpeg::ffprobe_duration_seconds(out_mp4).await {
            Ok(actual) if (actual - expected).abs() > 1.0 / fps as f64 + 0.05 => logw(format!(
                "Rendered duration {:.3}s differs from audio total {:.3}s",
                actual, expected
            )),
            Ok(actual) => logok(format!("Rendered {} ({:.2}s)", out_mp4.display(), actual)),
            Err(err) => logw(format!("Could not probe rendered video: {:#}", err)),
        }
        Ok(())
    }
}
