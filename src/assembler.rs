use crate::api::voice::VoiceParams;
use crate::api::{ImageProvider, Outcome, Providers, ScriptProvider, VoiceProvider};
use crate::clip::{ClipStyle, ParagraphClipBuilder};
use crate::config::Config;
use crate::error::PipelineError;
use crate::mock::MockDataSource;
use crate::render::{FfmpegRenderer, ReelRenderer};
use crate::script::{AssetManifest, Paragraph, ScriptOutput, ScriptSource};
use crate::{logi, logok, logw};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

/// Enrichment record for one paragraph, filled from concurrent provider calls
/// and merged back into the script only once every paragraph has reported.
#[derive(Debug)]
struct ParagraphState {
    pending: bool,
    image: Option<PathBuf>,
    voice: Option<Outcome<PathBuf>>,
}

impl Default for ParagraphState {
    fn default() -> Self {
        Self {
            pending: true,
            image: None,
            voice: None,
        }
    }
}

pub struct VideoAssembler {
    system_down: bool,
    output_dir: PathBuf,
    fps: u32,
    voice: VoiceParams,
    max_concurrency: usize,
    script_provider: Arc<dyn ScriptProvider>,
    image_provider: Arc<dyn ImageProvider>,
    voice_provider: Arc<dyn VoiceProvider>,
    clip_builder: ParagraphClipBuilder,
    renderer: Arc<dyn ReelRenderer>,
    mock: MockDataSource,
}

/// Lowercase alphanumeric slug used in output filenames.
pub fn theme_slug(theme: &str) -> String {
    let mut out = String::new();
    for ch in theme.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_end_matches('-').to_string();
    if out.is_empty() { "reel".to_string() } else { out }
}

impl VideoAssembler {
    /// Live providers, ffprobe timing and ffmpeg rendering, all from `cfg`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let providers = Providers::from_config(cfg)?;
        Ok(Self::new(cfg, providers))
    }

    pub fn new(cfg: &Config, providers: Providers) -> Self {
        Self {
            system_down: cfg.system_down,
            output_dir: cfg.output_dir.clone(),
            fps: cfg.fps.max(1),
            voice: cfg.voice.clone(),
            max_concurrency: cfg.max_concurrency.max(1),
            script_provider: providers.script,
            image_provider: providers.image,
            voice_provider: providers.voice,
            clip_builder: ParagraphClipBuilder::with_ffprobe(ClipStyle::from_config(cfg)),
            renderer: Arc::new(FfmpegRenderer),
            mock: MockDataSource::new(cfg.mock_voice_dir.clone()),
        }
    }

    pub fn with_clip_builder(mut self, clip_builder: ParagraphClipBuilder) -> Self {
        self.clip_builder = clip_builder;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ReelRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_mock_source(mut self, mock: MockDataSource) -> Self {
        self.mock = mock;
        self
    }

    /// Runs the pipeline, writing the video under the configured output dir.
    pub async fn assemble(&self, theme: &str) -> Result<AssetManifest, PipelineError> {
        let name = format!(
            "{}_{}.mp4",
            theme_slug(theme),
            chrono::Utc::now().format("%Y%m%d_%H%M%S%3f")
        );
        let out = self.output_dir.join(name);
        self.assemble_to(theme, &out).await
    }

    pub async fn assemble_to(&self, theme: &str, out_mp4: &Path) -> Result<AssetManifest, PipelineError> {
        logi(format!("=== Assembling reel for theme '{}' ===", theme));
        let (mut script, source) = self.obtain_script(theme).await;

        if script.paragraphs.is_empty() {
            return Err(PipelineError::EmptyScript {
                theme: theme.to_string(),
                title: script.script,
            });
        }

        if source != ScriptSource::Mock {
            self.enrich(&mut script.paragraphs).await?;
        }

        let mut clips = Vec::with_capacity(script.paragraphs.len());
        for (index, paragraph) in script.paragraphs.iter().enumerate() {
            let clip = self
                .clip_builder
                .build(index, paragraph)
                .await
                .map_err(|source| PipelineError::Clip { index, source })?;
            logi(format!(
                "Clip {}/{}: {:.2}s ({})",
                index + 1,
                script.paragraphs.len(),
                clip.duration,
                if clip.is_text_card() { "text card" } else { "image" }
            ));
            clips.push(clip);
        }

        self.renderer
            .render(&clips, out_mp4, self.fps)
            .await
            .map_err(PipelineError::Render)?;

        let manifest = AssetManifest {
            total_duration: clips.iter().map(|c| c.duration).sum(),
            clip_count: clips.len(),
            script_data: script,
            final_video: out_mp4.to_path_buf(),
            script_source: source,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let manifest_path = out_mp4.with_extension("json");
        tokio::fs::write(&manifest_path, manifest.to_json()?).await?;
        logok(format!(
            "Reel ready: {} ({} clips, {:.2}s), manifest {}",
            manifest.final_video.display(),
            manifest.clip_count,
            manifest.total_duration,
            manifest_path.display()
        ));
        Ok(manifest)
    }

    async fn obtain_script(&self, theme: &str) -> (ScriptOutput, ScriptSource) {
        if self.system_down {
            logw("System flagged down; using mock script data.");
            return (self.mock.generate(), ScriptSource::Mock);
        }

        let outcome = self.script_provider.generate(theme).await;
        let source = match &outcome {
            Outcome::Ready(_) => ScriptSource::Live,
            Outcome::Disabled(_) => {
                logi("Script provider disabled; continuing with its sample script.");
                ScriptSource::Disabled
            }
            Outcome::Failed(reason) => {
                logw(format!("Script provider failed: {}", reason));
                ScriptSource::Failed
            }
        };
        (outcome.into_script(), source)
    }

    async fn enrich(&self, paragraphs: &mut [Paragraph]) -> Result<(), PipelineError> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut task_index: HashMap<task::Id, usize> = HashMap::with_capacity(paragraphs.len());

        for (index, paragraph) in paragraphs.iter().enumerate() {
            let image = Arc::clone(&self.image_provider);
            let voice = Arc::clone(&self.voice_provider);
            let params = self.voice.for_paragraph(index);
            let permits = Arc::clone(&permits);
            let desc = paragraph.image_desc.clone();
            let text = paragraph.text.clone();

            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let (image, voice) = tokio::join!(image.generate(&desc), voice.generate(&text, &params));
                (index, image, voice)
            });
            task_index.insert(handle.id(), index);
        }

        let mut states: Vec<ParagraphState> = paragraphs.iter().map(|_| ParagraphState::default()).collect();
        while let Some(joined) = tasks.join_next().await {
            let (index, image, voice) = match joined {
                Ok(result) => result,
                Err(err) => {
                    let index = task_index.get(&err.id()).copied().unwrap_or_else(|| {
                        states.iter().position(|s| s.pending).unwrap_or(0)
                    });
                    return Err(PipelineError::Enrichment {
                        index,
                        reason: err.to_string(),
                    });
                }
            };

            let state = &mut states[index];
            state.pending = false;
            state.image = match image {
                Outcome::Ready(path) | Outcome::Disabled(path) => Some(path),
                Outcome::Failed(reason) => {
                    logw(format!(
                        "Paragraph {}: no image ({}); a text card will be used.",
                        index + 1,
                        reason
                    ));
                    None
                }
            };
            state.voice = Some(voice);
        }

        for (index, (paragraph, state)) in paragraphs.iter_mut().zip(states).enumerate() {
            paragraph.image_path = state.image;
            match state.voice {
                Some(Outcome::Ready(path)) | Some(Outcome::Disabled(path)) => {
                    paragraph.voice_path = Some(path);
                }
                Some(Outcome::Failed(reason)) => {
                    return Err(PipelineError::VoiceSynthesis { index, reason });
                }
                None => {
                    return Err(PipelineError::Enrichment {
                        index,
                        reason: "no result reported".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
