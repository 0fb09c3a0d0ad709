use super::{ImageProvider, Outcome, ScriptProvider, sanitized_prefix, unique_media_name, write_media};
use crate::config::Config;
use crate::script::ScriptOutput;
use crate::{logi, logw};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}

fn parse_envelope(raw: &str) -> Result<GenerateContentResponse, String> {
    let resp: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|e| format!("unparseable response: {}", e))?;
    if let Some(err) = &resp.error {
        return Err(format!(
            "Gemini error {}: {}",
            err.status.as_deref().unwrap_or("UNKNOWN"),
            err.message.as_deref().unwrap_or("no message")
        ));
    }
    Ok(resp)
}

fn body_snippet(raw: &str) -> String {
    raw.chars().take(800).collect()
}

async fn post_generate(
    client: &Client,
    api_url: &str,
    model: &str,
    api_key: &str,
    body: &Value,
) -> Result<String, String> {
    let url = format!("{}/models/{}:generateContent", api_url.trim_end_matches('/'), model);
    let resp = client
        .post(url)
        .query(&[("key", api_key)])
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                "Gemini request timed out".to_string()
            } else {
                format!("Gemini request failed: {}", e)
            }
        })?;

    let status = resp.status();
    let raw = resp.text().await.map_err(|e| {
        if e.is_timeout() {
            "Gemini response timed out".to_string()
        } else {
            format!("Gemini response read failed: {}", e)
        }
    })?;
    if !status.is_success() {
        if !raw.is_empty() {
            logw(format!("Gemini raw body: {}", body_snippet(&raw)));
        }
        return Err(format!("Gemini HTTP {}", status.as_u16()));
    }
    Ok(raw)
}

fn script_prompt(theme: &str) -> String {
    format!(
        "Generate a creative video script for a Brand on the theme '{}'. You are a marketing company, and this is a promotional video. \
The final output should be a 20-second reel divided into 4 short paragraphs (about 5 seconds each).\n\
For each paragraph, provide:\n\
1. A brief narrative that sounds natural and human, with realistic pauses, filler words, slight repetitions, and natural punctuation (commas, ellipses) to indicate breathing and pauses.\n\
2. A one-sentence, concise image description that visually represents the narrative of that paragraph.\n\
Also, provide an overall short description for a background music track that sets an appropriate mood for the reel.\n\
Return the result as valid JSON with the following keys:\n\
  - 'script': a summary or title of the entire reel,\n\
  - 'paragraphs': an array of objects, each containing 'text' (the paragraph narrative) and 'image_desc' (the image description), and\n\
  - 'bg_track': a brief description of the background music track.",
        theme
    )
}

fn script_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "script": {"type": "STRING"},
            "paragraphs": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "text": {"type": "STRING"},
                        "image_desc": {"type": "STRING"}
                    },
                    "required": ["text", "image_desc"]
                }
            },
            "bg_track": {"type": "STRING"}
        },
        "required": ["script", "paragraphs", "bg_track"]
    })
}

/// Turns a `generateContent` body into a validated script.
pub fn script_from_response(raw: &str) -> Result<ScriptOutput, String> {
    let resp = parse_envelope(raw)?;
    let text: String = resp
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        return Err("response carried no text".to_string());
    }
    ScriptOutput::from_model_text(&text).map_err(|e| e.to_string())
}

pub struct GeminiScriptProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    enabled: bool,
}

impl GeminiScriptProvider {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_url: cfg.gemini_api_url.clone(),
            api_key: cfg.gemini_api_key.clone(),
            model: cfg.gemini_script_model.clone(),
            enabled: cfg.script_enabled,
        }
    }
}

#[async_trait]
impl ScriptProvider for GeminiScriptProvider {
    async fn generate(&self, theme: &str) -> Outcome<ScriptOutput> {
        if !self.enabled {
            logi("Script generation disabled, returning sample script.");
            return Outcome::Disabled(ScriptOutput::disabled_sample());
        }

        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": script_prompt(theme)}]}],
            "generationConfig": {
                "maxOutputTokens": 600,
                "temperature": 0.7,
                "responseMimeType": "application/json",
                "responseSchema": script_response_schema(),
            },
        });

        logi(format!("Requesting script for theme '{}'...", theme));
        let raw = match post_generate(&self.client, &self.api_url, &self.model, &self.api_key, &body).await {
            Ok(raw) => raw,
            Err(reason) => {
                logw(format!("Script generation failed: {}", reason));
                return Outcome::Failed(reason);
            }
        };

        match script_from_response(&raw) {
            Ok(script) => {
                logi(format!("Script received: {} paragraphs", script.paragraphs.len()));
                Outcome::Ready(script)
            }
            Err(reason) => {
                logw(format!("Script response malformed: {}", reason));
                logw(format!("Gemini raw body: {}", body_snippet(&raw)));
                Outcome::Failed(reason)
            }
        }
    }
}

/// Extension for a decoded image payload, or `None` if the bytes are not an image.
pub fn sniff_image_ext(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// First inline image in a `generateContent` body, decoded.
pub fn image_from_response(raw: &str) -> Result<(Vec<u8>, &'static str), String> {
    let resp = parse_envelope(raw)?;
    let inline = resp
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.inline_data)
        .ok_or_else(|| "no image data in response".to_string())?;

    let bytes = STANDARD
        .decode(inline.data.trim())
        .map_err(|e| format!("image payload is not valid base64: {}", e))?;
    let ext = sniff_image_ext(&bytes).ok_or_else(|| {
        format!(
            "image payload ({}) is not a recognized image",
            inline.mime_type.as_deref().unwrap_or("unknown mime")
        )
    })?;
    Ok((bytes, ext))
}

pub fn mock_image_name(description: &str) -> String {
    format!("mock_image_{}.jpg", sanitized_prefix(description))
}

pub struct GeminiImageProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    media_dir: PathBuf,
    enabled: bool,
}

impl GeminiImageProvider {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_url: cfg.gemini_api_url.clone(),
            api_key: cfg.gemini_api_key.clone(),
            model: cfg.gemini_image_model.clone(),
            media_dir: cfg.media_dir.clone(),
            enabled: cfg.image_enabled,
        }
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    async fn generate(&self, description: &str) -> Outcome<PathBuf> {
        if !self.enabled {
            return Outcome::Disabled(PathBuf::from(mock_image_name(description)));
        }

        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": description}]}],
            "generationConfig": {"responseModalities": ["Text", "Image"]},
        });

        let raw = match post_generate(&self.client, &self.api_url, &self.model, &self.api_key, &body).await {
            Ok(raw) => raw,
            Err(reason) => {
                logw(format!("Image generation failed: {}", reason));
                return Outcome::Failed(reason);
            }
        };

        let (bytes, ext) = match image_from_response(&raw) {
            Ok(v) => v,
            Err(reason) => {
                logw(format!("Image generation failed: {}", reason));
                return Outcome::Failed(reason);
            }
        };

        let path = self.media_dir.join(unique_media_name("gemini_image", description, ext));
        if let Err(err) = write_media(&path, &bytes).await {
            logw(format!("Saving image failed: {:#}", err));
            return Outcome::Failed(err.to_string());
        }
        logi(format!("Image saved: {}", path.display()));
        Outcome::Ready(path)
    }
}
