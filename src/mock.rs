use crate::script::{Paragraph, ScriptOutput};
use std::path::PathBuf;

pub const MOCK_PARAGRAPH_COUNT: usize = 7;

/// Canned script used while the system is flagged down.
///
/// Voice paths point at `mock_voice_<n>.mp3` inside `voice_dir`. Nothing is
/// created there; callers that want a rendered video must put real audio at
/// those paths.
#[derive(Debug, Clone)]
pub struct MockDataSource {
    voice_dir: PathBuf,
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new(".")
    }
}

impl MockDataSource {
    pub fn new(voice_dir: impl Into<PathBuf>) -> Self {
        Self {
            voice_dir: voice_dir.into(),
        }
    }

    pub fn voice_path(&self, number: usize) -> PathBuf {
        self.voice_dir.join(format!("mock_voice_{}.mp3", number))
    }

    pub fn generate(&self) -> ScriptOutput {
        let paragraphs = (1..=MOCK_PARAGRAPH_COUNT)
            .map(|i| Paragraph {
                text: format!(
                    "Paragraph {}: Okay, so, imagine this... you're, like, in the midst of a \
coding adventure, where every keystroke reveals a new secret. It's, um, pretty exciting, right?",
                    i
                ),
                image_desc: format!(
                    "Image {} description: A vibrant scene depicting digital landscapes with \
pixelated elements and dynamic colors, illustrating the coding adventure.",
                    i
                ),
                image_path: None,
                voice_path: Some(self.voice_path(i)),
            })
            .collect();

        ScriptOutput {
            script: "Coding Adventure in Pixels".to_string(),
            paragraphs,
            bg_track: "Upbeat, chiptune-inspired music with a playful and adventurous feel. \
Starts softly and builds in intensity as the journey progresses."
                .to_string(),
        }
    }
}
