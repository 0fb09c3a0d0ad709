use crate::api::voice::VoiceParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceBackend {
    #[default]
    Google,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_url: String,
    pub gemini_script_model: String,
    pub gemini_image_model: String,

    pub google_tts_key: String,
    pub google_tts_url: String,

    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,

    pub voice_backend: VoiceBackend,
    pub voice: VoiceParams,

    pub script_enabled: bool,
    pub image_enabled: bool,
    pub voice_enabled: bool,
    /// Routes the whole run through the mock data source.
    pub system_down: bool,

    pub media_dir: PathBuf,
    pub output_dir: PathBuf,
    pub mock_voice_dir: PathBuf,
    pub font_path: PathBuf,
    pub fps: u32,
    pub fade_secs: Option<f64>,
    pub request_timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_script_model: "gemini-2.0-flash".to_string(),
            gemini_image_model: "gemini-2.0-flash-exp-image-generation".to_string(),
            google_tts_key: String::new(),
            google_tts_url: "https://texttospeech.googleapis.com/v1".to_string(),
            elevenlabs_key: String::new(),
            eleven_voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            eleven_model_id: "eleven_multilingual_v2".to_string(),
            voice_backend: VoiceBackend::default(),
            voice: VoiceParams::default(),
            script_enabled: true,
            image_enabled: true,
            voice_enabled: true,
            system_down: false,
            media_dir: PathBuf::from("media"),
            output_dir: PathBuf::from("output"),
            mock_voice_dir: PathBuf::from("."),
            font_path: PathBuf::from("assets/fonts/Poppins-SemiBold.ttf"),
            fps: 24,
            fade_secs: None,
            request_timeout_secs: 120,
            max_concurrency: 4,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise starts from defaults; then applies
    /// environment overrides and validates.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(&path).await?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_flag("SYSTEM_DOWN_TIME") {
            self.system_down = v;
        }
        if let Some(v) = env_flag("SCRIPT_ENABLED") {
            self.script_enabled = v;
        }
        if let Some(v) = env_flag("IMAGE_ENABLED") {
            self.image_enabled = v;
        }
        if let Some(v) = env_flag("VOICE_ENABLED") {
            self.voice_enabled = v;
        }
        if let Some(v) = env_string("GEMINI_API_KEY") {
            self.gemini_api_key = v;
        }
        if let Some(v) = env_string("GEMINI_API_URL") {
            self.gemini_api_url = v;
        }
        if let Some(v) = env_string("GOOGLE_TTS_API_KEY") {
            self.google_tts_key = v;
        }
        if let Some(v) = env_string("ELEVENLABS_API_KEY") {
            self.elevenlabs_key = v;
        }
        if let Some(v) = env_string("VOICE_ID") {
            self.eleven_voice_id = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            anyhow::bail!("config: fps must be positive");
        }
        if self.max_concurrency == 0 {
            anyhow::bail!("config: max_concurrency must be positive");
        }
        if self.system_down {
            return Ok(());
        }
        if (self.script_enabled || self.image_enabled) && self.gemini_api_key.is_empty() {
            anyhow::bail!("config: gemini_api_key missing");
        }
        if self.voice_enabled {
            match self.voice_backend {
                VoiceBackend::Google if self.google_tts_key.is_empty() => {
                    anyhow::bail!("config: google_tts_key missing")
                }
                VoiceBackend::ElevenLabs if self.elevenlabs_key.is_empty() => {
                    anyhow::bail!("config: elevenlabs_api_key missing")
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
