use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

pub mod api;
pub mod assembler;
pub mod clip;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod mock;
pub mod render;
pub mod script;

pub use assembler::VideoAssembler;
pub use error::{ClipError, PipelineError};
pub use script::{AssetManifest, Paragraph, ScriptOutput};

/// Receives every pipeline log line, already prefixed with its `[TAG]`.
pub type PipelineLogHook = Arc<dyn Fn(&str) + Send + Sync + 'static>;

static LOG_HOOK: Lazy<RwLock<Option<PipelineLogHook>>> = Lazy::new(|| RwLock::new(None));

/// Mirrors pipeline log lines into `hook` as well as `tracing`; `None` detaches it.
pub fn set_log_hook(hook: Option<PipelineLogHook>) {
    if let Ok(mut slot) = LOG_HOOK.write() {
        *slot = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    if tag == "WARN" {
        tracing::warn!(target: "reel", "{}", message);
    } else {
        tracing::info!(target: "reel", tag, "{}", message);
    }

    let hook = LOG_HOOK.read().ok().and_then(|slot| slot.clone());
    if let Some(hook) = hook {
        hook(&format!("[{}] {}", tag, message));
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
