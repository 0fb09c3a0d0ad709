use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum VoiceGender {
    #[default]
    Neutral,
    Male,
    Female,
}

impl VoiceGender {
    /// Case-insensitive; anything unrecognized is `Neutral`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "MALE" => Self::Male,
            "FEMALE" => Self::Female,
            _ => Self::Neutral,
        }
    }

    pub fn api_name(self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::Male => "MALE",
            Self::Female => "FEMALE",
        }
    }
}

impl From<String> for VoiceGender {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum AudioEncoding {
    #[default]
    Mp3,
    Linear16,
    OggOpus,
    Mulaw,
    Alaw,
}

impl AudioEncoding {
    /// Case-insensitive; anything unrecognized is `Mp3`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "LINEAR16" => Self::Linear16,
            "OGG_OPUS" => Self::OggOpus,
            "MULAW" => Self::Mulaw,
            "ALAW" => Self::Alaw,
            _ => Self::Mp3,
        }
    }

    pub fn api_name(self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::Linear16 => "LINEAR16",
            Self::OggOpus => "OGG_OPUS",
            Self::Mulaw => "MULAW",
            Self::Alaw => "ALAW",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggOpus => "ogg",
            Self::Linear16 | Self::Mulaw | Self::Alaw => "wav",
        }
    }
}

impl From<String> for AudioEncoding {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceParams {
    pub language_code: String,
    pub gender: VoiceGender,
    pub voice_name: Option<String>,
    pub encoding: AudioEncoding,
    /// 1.0 is normal speed.
    pub speaking_rate: f64,
    /// Semitones.
    pub pitch: f64,
    pub volume_gain_db: f64,
    pub effects_profile_ids: Vec<String>,
    pub output_file: Option<PathBuf>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            gender: VoiceGender::Neutral,
            voice_name: None,
            encoding: AudioEncoding::Mp3,
            speaking_rate: 1.0,
            pitch: 0.0,
            volume_gain_db: 0.0,
            effects_profile_ids: Vec::new(),
            output_file: None,
        }
    }
}

impl VoiceParams {
    /// Copy for paragraph `index` (zero-based). An explicit `output_file` gets
    /// a `_<index + 1>` suffix on its stem so paragraphs never share a file.
    pub fn for_paragraph(&self, index: usize) -> Self {
        let mut params = self.clone();
        if let Some(path) = &self.output_file {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "voice".to_string());
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.encoding.extension().to_string());
            params.output_file = Some(path.with_file_name(format!("{}_{}.{}", stem, index + 1, ext)));
        }
        params
    }
}
