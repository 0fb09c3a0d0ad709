use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const FAILED_SCRIPT_TITLE: &str = "Failed to generate script.";
pub const DISABLED_SCRIPT_TITLE: &str = "[MOCK] Sample script";

/// One narrated segment of the reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub text: String,
    pub image_desc: String,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub voice_path: Option<PathBuf>,
}

impl Paragraph {
    pub fn new(text: impl Into<String>, image_desc: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_desc: image_desc.into(),
            image_path: None,
            voice_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptOutput {
    pub script: String,
    pub paragraphs: Vec<Paragraph>,
    pub bg_track: String,
}

#[derive(Debug, Error)]
pub enum ScriptParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,
    #[error("script JSON does not match the expected shape: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("paragraph {0} has empty narrative text")]
    BlankParagraph(usize),
}

// Wire shape: the model only ever supplies text and image_desc.
#[derive(Debug, Deserialize)]
struct WireParagraph {
    text: String,
    image_desc: String,
}

#[derive(Debug, Deserialize)]
struct WireScript {
    script: String,
    paragraphs: Vec<WireParagraph>,
    bg_track: String,
}

impl ScriptOutput {
    /// Sentinel returned when the script provider failed.
    pub fn failed_sentinel() -> Self {
        Self {
            script: FAILED_SCRIPT_TITLE.to_string(),
            paragraphs: Vec::new(),
            bg_track: String::new(),
        }
    }

    /// Fixed sample returned when the script provider is disabled.
    pub fn disabled_sample() -> Self {
        Self {
            script: DISABLED_SCRIPT_TITLE.to_string(),
            paragraphs: vec![Paragraph::new("Sample paragraph", "Sample image description")],
            bg_track: "epic cinematic".to_string(),
        }
    }

    /// Parses model output into a validated script.
    ///
    /// Accepts a bare JSON object, or any text (markdown fences included) that
    /// contains one between its first `{` and last `}`.
    pub fn from_model_text(raw: &str) -> Result<Self, ScriptParseError> {
        let trimmed = raw.trim();
        let wire: WireScript = match serde_json::from_str(trimmed) {
            Ok(wire) => wire,
            Err(_) => serde_json::from_str(extract_json_object(trimmed)?)?,
        };

        for (idx, para) in wire.paragraphs.iter().enumerate() {
            if para.text.trim().is_empty() {
                return Err(ScriptParseError::BlankParagraph(idx + 1));
            }
        }

        Ok(Self {
            script: wire.script,
            paragraphs: wire
                .paragraphs
                .into_iter()
                .map(|p| Paragraph::new(p.text, p.image_desc))
                .collect(),
            bg_track: wire.bg_track,
        })
    }
}

/// Slice between the first `{` and the last `}` of `text`, inclusive.
pub fn extract_json_object(text: &str) -> Result<&str, ScriptParseError> {
    let start = text.find('{').ok_or(ScriptParseError::NoJsonObject)?;
    let end = text.rfind('}').ok_or(ScriptParseError::NoJsonObject)?;
    if end < start {
        return Err(ScriptParseError::NoJsonObject);
    }
    Ok(&text[start..=end])
}

/// Where the script of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptSource {
    Live,
    Disabled,
    Failed,
    Mock,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetManifest {
    pub script_data: ScriptOutput,
    pub final_video: PathBuf,
    pub total_duration: f64,
    pub clip_count: usize,
    pub script_source: ScriptSource,
    pub created_at: String,
}

impl AssetManifest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
