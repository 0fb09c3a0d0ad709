//! Generative service boundaries.
//!
//! Every provider answers with an [`Outcome`]: a live value, the fixed value
//! used while the provider is switched off, or a failure reason. Providers
//! never return `Err` to the pipeline.

use crate::config::{Config, VoiceBackend};
use crate::script::ScriptOutput;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub mod elevenlabs;
pub mod gemini;
pub mod google_tts;
pub mod voice;

use voice::VoiceParams;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Disabled(T),
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl Outcome<ScriptOutput> {
    /// Collapses to a script, substituting the error sentinel on failure.
    pub fn into_script(self) -> ScriptOutput {
        match self {
            Self::Ready(s) | Self::Disabled(s) => s,
            Self::Failed(_) => ScriptOutput::failed_sentinel(),
        }
    }
}

#[async_trait]
pub trait ScriptProvider: Send + Sync {
    async fn generate(&self, theme: &str) -> Outcome<ScriptOutput>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn generate(&self, description: &str) -> Outcome<PathBuf>;
}

#[async_trait]
pub trait VoiceProvider: Send + Sync {
    async fn generate(&self, text: &str, params: &VoiceParams) -> Outcome<PathBuf>;
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());
static MEDIA_SEQ: AtomicU64 = AtomicU64::new(0);

/// First ten characters of `text` with every non-alphanumeric replaced by `_`.
pub fn sanitized_prefix(text: &str) -> String {
    let head: String = text.chars().take(10).collect();
    UNSAFE_CHARS.replace_all(&head, "_").into_owned()
}

/// Collision-free within the process: millisecond timestamp plus a counter.
pub fn unique_media_name(prefix: &str, text: &str, ext: &str) -> String {
    let seq = MEDIA_SEQ.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}_{}_{}_{}.{}", prefix, sanitized_prefix(text), millis, seq, ext)
}

pub(crate) async fn write_media(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub(crate) fn build_http_client(cfg: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(cfg.request_timeout())
        .connect_timeout(cfg.request_timeout().min(std::time::Duration::from_secs(30)))
        .build()
        .context("Failed to build HTTP client")
}

/// The three live providers selected by `cfg`.
pub struct Providers {
    pub script: Arc<dyn ScriptProvider>,
    pub image: Arc<dyn ImageProvider>,
    pub voice: Arc<dyn VoiceProvider>,
}

impl Providers {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let client = build_http_client(cfg)?;
        let voice: Arc<dyn VoiceProvider> = match cfg.voice_backend {
            VoiceBackend::Google => {
                Arc::new(google_tts::GoogleTtsProvider::new(client.clone(), cfg))
            }
            VoiceBackend::ElevenLabs => {
                Arc::new(elevenlabs::ElevenLabsVoiceProvider::new(client.clone(), cfg))
            }
        };
        Ok(Self {
            script: Arc::new(gemini::GeminiScriptProvider::new(client.clone(), cfg)),
            image: Arc::new(gemini::GeminiImageProvider::new(client, cfg)),
            voice,
        })
    }
}

/// Local HTTP endpoint that reads one request, answers `200` with a declared
/// body length, then hangs up halfway through the body.
#[cfg(test)]
pub(crate) async fn truncated_body_endpoint() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut req = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = sock.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            req.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&req).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let len = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if req.len() >= end + 4 + len {
                    break;
                }
            }
        }
        sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 4096\r\n\r\n{\"cand")
            .await
            .unwrap();
        sock.flush().await.unwrap();
    });
    format!("http://{}", addr)
}
