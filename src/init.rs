use crate::config::Config;
use crate::{logi, logw};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.media_dir, &cfg.output_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    for tool in ["ffmpeg", "ffprobe"] {
        let ok = match tokio::process::Command::new(tool).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Warns early when the caption font is absent; text cards would fail later.
pub fn check_font(cfg: &Config) -> bool {
    let present = Path::new(&cfg.font_path).is_file();
    if !present {
        logw(format!(
            "Font not found at {}; paragraphs without images will fail to render.",
            cfg.font_path.display()
        ));
    }
    present
}
