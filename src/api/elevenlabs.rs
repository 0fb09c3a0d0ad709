use super::google_tts::MOCK_VOICE_FILE;
use super::voice::VoiceParams;
use super::{Outcome, VoiceProvider, unique_media_name, write_media};
use crate::config::Config;
use crate::{logi, logw};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;

const ELEVENLABS_API: &str = "https://api.elevenlabs.io/v1";

/// ElevenLabs only honours the text and an explicit output file; the other
/// voice parameters belong to the Google backend.
pub struct ElevenLabsVoiceProvider {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    media_dir: PathBuf,
    enabled: bool,
}

impl ElevenLabsVoiceProvider {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
            media_dir: cfg.media_dir.clone(),
            enabled: cfg.voice_enabled,
        }
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsVoiceProvider {
    async fn generate(&self, text: &str, params: &VoiceParams) -> Outcome<PathBuf> {
        if !self.enabled {
            return Outcome::Disabled(PathBuf::from(MOCK_VOICE_FILE));
        }

        let url = format!(
            "{}/text-to-speech/{}?output_format=mp3_44100_128",
            ELEVENLABS_API, self.voice_id
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {"stability": 0.5, "similarity_boost": 0.75},
        });

        let resp = match self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let reason = format!("ElevenLabs request failed: {}", err);
                logw(&reason);
                return Outcome::Failed(reason);
            }
        };

        if !resp.status().is_success() {
            let reason = format!("ElevenLabs TTS failed HTTP {}", resp.status().as_u16());
            logw(&reason);
            return Outcome::Failed(reason);
        }

        let bytes = match resp.bytes().await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Outcome::Failed("ElevenLabs returned an empty body".to_string()),
            Err(err) => return Outcome::Failed(format!("ElevenLabs response read failed: {}", err)),
        };

        let path = params
            .output_file
            .clone()
            .unwrap_or_else(|| self.media_dir.join(unique_media_name("voice", text, "mp3")));
        if let Err(err) = write_media(&path, &bytes).await {
            logw(format!("Saving audio failed: {:#}", err));
            return Outcome::Failed(err.to_string());
        }
        logi(format!("ElevenLabs audio written to {}", path.display()));
        Outcome::Ready(path)
    }
}
