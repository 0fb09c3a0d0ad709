use super::voice::VoiceParams;
use super::{Outcome, VoiceProvider, unique_media_name, write_media};
use crate::config::Config;
use crate::{logi, logw};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;

pub const MOCK_VOICE_FILE: &str = "mock_voice_over.mp3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

pub fn synthesize_request(text: &str, params: &VoiceParams) -> Value {
    let mut voice = json!({
        "languageCode": params.language_code,
        "ssmlGender": params.gender.api_name(),
    });
    if let Some(name) = &params.voice_name {
        voice["name"] = json!(name);
    }
    json!({
        "input": {"text": text},
        "voice": voice,
        "audioConfig": {
            "audioEncoding": params.encoding.api_name(),
            "speakingRate": params.speaking_rate,
            "pitch": params.pitch,
            "volumeGainDb": params.volume_gain_db,
            "effectsProfileId": params.effects_profile_ids,
        },
    })
}

pub fn audio_from_response(raw: &str) -> Result<Vec<u8>, String> {
    let resp: SynthesizeResponse =
        serde_json::from_str(raw).map_err(|e| format!("unparseable TTS response: {}", e))?;
    let b64 = resp
        .audio_content
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "TTS response carried no audioContent".to_string())?;
    STANDARD
        .decode(b64.trim())
        .map_err(|e| format!("audioContent is not valid base64: {}", e))
}

pub struct GoogleTtsProvider {
    client: Client,
    api_url: String,
    api_key: String,
    media_dir: PathBuf,
    enabled: bool,
}

impl GoogleTtsProvider {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_url: cfg.google_tts_url.clone(),
            api_key: cfg.google_tts_key.clone(),
            media_dir: cfg.media_dir.clone(),
            enabled: cfg.voice_enabled,
        }
    }

    fn output_path(&self, text: &str, params: &VoiceParams) -> PathBuf {
        match &params.output_file {
            Some(path) => path.clone(),
            None => self
                .media_dir
                .join(unique_media_name("voice", text, params.encoding.extension())),
        }
    }
}

#[async_trait]
impl VoiceProvider for GoogleTtsProvider {
    async fn generate(&self, text: &str, params: &VoiceParams) -> Outcome<PathBuf> {
        if !self.enabled {
            logi("Voice generation disabled, returning mock file.");
            return Outcome::Disabled(PathBuf::from(MOCK_VOICE_FILE));
        }

        let url = format!("{}/text:synthesize", self.api_url.trim_end_matches('/'));
        let resp = match self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&synthesize_request(text, params))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let reason = if err.is_timeout() {
                    "TTS request timed out".to_string()
                } else {
                    format!("TTS request failed: {}", err)
                };
                logw(&reason);
                return Outcome::Failed(reason);
            }
        };

        let status = resp.status();
        let raw = match resp.text().await {
            Ok(raw) => raw,
            Err(err) => {
                let reason = if err.is_timeout() {
                    "TTS response timed out".to_string()
                } else {
                    format!("TTS response read failed: {}", err)
                };
                logw(&reason);
                return Outcome::Failed(reason);
            }
        };
        if !status.is_success() {
            let reason = format!("TTS HTTP {}", status.as_u16());
            logw(format!("{}: {}", reason, raw.chars().take(400).collect::<String>()));
            return Outcome::Failed(reason);
        }

        let audio = match audio_from_response(&raw) {
            Ok(bytes) => bytes,
            Err(reason) => {
                logw(&reason);
                return Outcome::Failed(reason);
            }
        };

        let path = self.output_path(text, params);
        if let Err(err) = write_media(&path, &audio).await {
            logw(format!("Saving audio failed: {:#}", err));
            return Outcome::Failed(err.to_string());
        }
        logi(format!("Audio content written to {}", path.display()));
        Outcome::Ready(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::voice::{AudioEncoding, VoiceGender};

    #[test]
    fn request_carries_all_voice_parameters() {
        let params = VoiceParams {
            gender: VoiceGender::Male,
            voice_name: Some("en-US-Chirp-HD-D".to_string()),
            encoding: AudioEncoding::Linear16,
            speaking_rate: 0.5,
            pitch: -2.0,
            volume_gain_db: 2.0,
            effects_profile_ids: vec!["handset-class-device".to_string()],
            ..VoiceParams::default()
        };
        let body = synthesize_request("Hello world", &params);
        assert_eq!(body["input"]["text"], "Hello world");
        assert_eq!(body["voice"]["ssmlGender"], "MALE");
        assert_eq!(body["voice"]["name"], "en-US-Chirp-HD-D");
        assert_eq!(body["audioConfig"]["audioEncoding"], "LINEAR16");
        assert_eq!(body["audioConfig"]["pitch"], -2.0);
        assert_eq!(body["audioConfig"]["effectsProfileId"][0], "handset-class-device");
    }

    #[test]
    fn voice_name_is_omitted_when_unset() {
        let body = synthesize_request("x", &VoiceParams::default());
        assert!(body["voice"].get("name").is_none());
        assert_eq!(body["voice"]["ssmlGender"], "NEUTRAL");
        assert_eq!(body["audioConfig"]["audioEncoding"], "MP3");
    }

    #[test]
    fn audio_content_is_decoded() {
        let raw = json!({"audioContent": STANDARD.encode(b"ID3fake")}).to_string();
        assert_eq!(audio_from_response(&raw).unwrap(), b"ID3fake");
        assert!(audio_from_response("{}").is_err());
        assert!(audio_from_response(r#"{"audioContent":"!!"}"#).is_err());
    }

    #[tokio::test]
    async fn disabled_returns_fixed_mock_file() {
        let cfg = Config {
            voice_enabled: false,
            ..Config::default()
        };
        let provider = GoogleTtsProvider::new(Client::new(), &cfg);
        let outcome = provider.generate("Hello", &VoiceParams::default()).await;
        assert_eq!(outcome, Outcome::Disabled(PathBuf::from(MOCK_VOICE_FILE)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails() {
        let cfg = Config {
            google_tts_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 5,
            ..Config::default()
        };
        let provider = GoogleTtsProvider::new(Client::new(), &cfg);
        assert!(provider.generate("Hello", &VoiceParams::default()).await.is_failed());
    }

    #[test]
    fn explicit_output_file_wins() {
        let provider = GoogleTtsProvider::new(Client::new(), &Config::default());
        let params = VoiceParams {
            output_file: Some(PathBuf::from("narration.mp3")),
            ..VoiceParams::default()
        };
        assert_eq!(provider.output_path("hi", &params), PathBuf::from("narration.mp3"));
        let generated = provider.output_path("hi", &VoiceParams::default());
        assert!(generated.starts_with("media"));
        assert_eq!(generated.extension().and_then(|e| e.to_str()), Some("mp3"));
    }

    #[tokio::test]
    async fn truncated_body_is_reported_as_read_failure() {
        let cfg = Config {
            google_tts_url: crate::api::truncated_body_endpoint().await,
            request_timeout_secs: 5,
            ..Config::default()
        };
        let provider = GoogleTtsProvider::new(Client::new(), &cfg);
        match provider.generate("Hello", &VoiceParams::default()).await {
            Outcome::Failed(reason) => assert!(reason.starts_with("TTS response read failed"), "{}", reason),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
