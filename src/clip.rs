//! Per-paragraph clip composition.
//!
//! A [`Clip`] is a description, not rendered media: the renderer turns the
//! whole ordered list into one video in a single pass.

use crate::config::Config;
use crate::error::ClipError;
use crate::ffmpeg;
use crate::logw;
use crate::script::Paragraph;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const FRAME_WIDTH: u32 = 1280;
pub const FRAME_HEIGHT: u32 = 720;
pub const CAPTION_WIDTH: u32 = 1200;
pub const BACKGROUND_COLOR: &str = "0xFFFF00";
pub const DEFAULT_FONT_SIZE: u32 = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    /// Still image fitted into the frame.
    Image { path: PathBuf },
    /// Solid background with the paragraph text centred on top.
    TextCard {
        background: String,
        lines: Vec<String>,
        font: PathBuf,
        font_size: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub index: usize,
    pub visual: Visual,
    pub audio: PathBuf,
    /// Seconds, taken from the audio track.
    pub duration: f64,
    pub fade: Option<f64>,
}

impl Clip {
    pub fn is_text_card(&self) -> bool {
        matches!(self.visual, Visual::TextCard { .. })
    }
}

#[async_trait]
pub trait AudioProbe: Send + Sync {
    async fn duration_seconds(&self, path: &Path) -> anyhow::Result<f64>;
}

pub struct FfprobeAudio;

#[async_trait]
impl AudioProbe for FfprobeAudio {
    async fn duration_seconds(&self, path: &Path) -> anyhow::Result<f64> {
        ffmpeg::ffprobe_duration_seconds(path).await
    }
}

#[derive(Debug, Clone)]
pub struct ClipStyle {
    pub font_path: PathBuf,
    pub font_size: u32,
    /// Fade in/out length at both clip edges; `None` disables fades.
    pub fade_secs: Option<f64>,
}

impl Default for ClipStyle {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("assets/fonts/Poppins-SemiBold.ttf"),
            font_size: DEFAULT_FONT_SIZE,
            fade_secs: None,
        }
    }
}

impl ClipStyle {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            font_path: cfg.font_path.clone(),
            fade_secs: cfg.fade_secs,
            ..Self::default()
        }
    }
}

/// Rough glyph budget for one caption line.
pub fn chars_per_line(font_size: u32) -> usize {
    let glyph = (font_size as f64 * 0.55).max(1.0);
    ((CAPTION_WIDTH as f64 / glyph).floor() as usize).max(1)
}

/// Greedy word wrap; words longer than `max_chars` are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

pub struct ParagraphClipBuilder {
    style: ClipStyle,
    probe: Arc<dyn AudioProbe>,
}

impl ParagraphClipBuilder {
    pub fn new(style: ClipStyle, probe: Arc<dyn AudioProbe>) -> Self {
        Self { style, probe }
    }

    pub fn with_ffprobe(style: ClipStyle) -> Self {
        Self::new(style, Arc::new(FfprobeAudio))
    }

    pub async fn build(&self, index: usize, paragraph: &Paragraph) -> Result<Clip, ClipError> {
        let audio = paragraph.voice_path.clone().ok_or_else(|| ClipError::MissingAudio {
            reason: "voice_path is not set".to_string(),
        })?;
        if !is_file(&audio).await {
            return Err(ClipError::MissingAudio {
                reason: format!("{} does not exist", audio.display()),
            });
        }

        let duration = self
            .probe
            .duration_seconds(&audio)
            .await
            .map_err(|e| ClipError::UndecodableAudio {
                path: audio.clone(),
                reason: format!("{:#}", e),
            })?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ClipError::UndecodableAudio {
                path: audio,
                reason: format!("non-positive duration {}", duration),
            });
        }

        let visual = match &paragraph.image_path {
            Some(path) if is_file(path).await => Visual::Image { path: path.clone() },
            other => {
                if let Some(path) = other {
                    logw(format!(
                        "Image {} for paragraph {} is missing; using text card.",
                        path.display(),
                        index + 1
                    ));
                }
                self.text_card(&paragraph.text).await?
            }
        };

        let fade = self
            .style
            .fade_secs
            .filter(|f| *f > 0.0)
            .map(|f| f.min(duration / 2.0));

        Ok(Clip {
            index,
            visual,
            audio,
            duration,
            fade,
        })
    }

    async fn text_card(&self, text: &str) -> Result<Visual, ClipError> {
        if !is_file(&self.style.font_path).await {
            return Err(ClipError::MissingFontAsset {
                path: self.style.font_path.clone(),
            });
        }
        Ok(Visual::TextCard {
            background: BACKGROUND_COLOR.to_string(),
            lines: wrap_text(text, chars_per_line(self.style.font_size)),
            font: self.style.font_path.clone(),
            font_size: self.style.font_size,
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
