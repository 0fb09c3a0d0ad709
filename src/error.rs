use std::path::PathBuf;
use thiserror::Error;

/// Local precondition failures while turning a paragraph into a clip.
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("missing audio: {reason}")]
    MissingAudio { reason: String },

    #[error("font asset not found at {}", .path.display())]
    MissingFontAsset { path: PathBuf },

    #[error("audio {} could not be decoded: {reason}", .path.display())]
    UndecodableAudio { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("script for theme '{theme}' has no paragraphs (script title: {title})")]
    EmptyScript { theme: String, title: String },

    #[error("paragraph {}: voice synthesis failed: {reason}", .index + 1)]
    VoiceSynthesis { index: usize, reason: String },

    #[error("paragraph {}: {source}", .index + 1)]
    Clip {
        index: usize,
        #[source]
        source: ClipError,
    },

    #[error("paragraph {}: enrichment task aborted: {reason}", .index + 1)]
    Enrichment { index: usize, reason: String },

    #[error("render failed: {0:#}")]
    Render(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Zero-based index of the paragraph the failure belongs to, if any.
    pub fn paragraph_index(&self) -> Option<usize> {
        match self {
            Self::VoiceSynthesis { index, .. }
            | Self::Clip { index, .. }
            | Self::Enrichment { index, .. } => Some(*index),
            _ => None,
        }
    }
}
