use ai_promo_reels::api::voice::VoiceParams;
use ai_promo_reels::api::{ImageProvider, Outcome, Providers, ScriptProvider, VoiceProvider};
use ai_promo_reels::clip::{AudioProbe, Clip, ClipStyle, ParagraphClipBuilder, Visual};
use ai_promo_reels::config::Config;
use ai_promo_reels::mock::{MOCK_PARAGRAPH_COUNT, MockDataSource};
use ai_promo_reels::render::ReelRenderer;
use ai_promo_reels::script::{Paragraph, ScriptOutput, ScriptSource};
use ai_promo_reels::{ClipError, PipelineError, VideoAssembler};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

struct FixedScript(Outcome<ScriptOutput>);

#[async_trait]
impl ScriptProvider for FixedScript {
    async fn generate(&self, _theme: &str) -> Outcome<ScriptOutput> {
        self.0.clone()
    }
}

/// Writes a PNG for every description except those containing "nothing".
struct DiskImages {
    dir: PathBuf,
    calls: AtomicUsize,
}

#[async_trait]
impl ImageProvider for DiskImages {
    async fn generate(&self, description: &str) -> Outcome<PathBuf> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if description.contains("nothing") {
            return Outcome::Failed("no image data in response".to_string());
        }
        let path = self.dir.join(format!("image_{}.png", n));
        std::fs::write(&path, PNG_HEADER).unwrap();
        Outcome::Ready(path)
    }
}

/// Narration text is "<seconds>|<words>"; the audio file stores the seconds so
/// the probe can read them back. Earlier paragraphs answer later.
struct DiskVoices {
    dir: PathBuf,
    calls: AtomicUsize,
}

#[async_trait]
impl VoiceProvider for DiskVoices {
    async fn generate(&self, text: &str, params: &VoiceParams) -> Outcome<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (secs, words) = text.split_once('|').unwrap();
        if words.contains("mute") {
            return Outcome::Failed("TTS HTTP 500".to_string());
        }
        let delay = 60u64.saturating_sub((secs.parse::<f64>().unwrap() * 10.0) as u64);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let path = params
            .output_file
            .clone()
            .unwrap_or_else(|| self.dir.join(format!("voice_{}.mp3", secs)));
        std::fs::write(&path, secs).unwrap();
        Outcome::Ready(path)
    }
}

/// Panics for descriptions containing "boom"; others resolve immediately.
struct ExplodingImages;

#[async_trait]
impl ImageProvider for ExplodingImages {
    async fn generate(&self, description: &str) -> Outcome<PathBuf> {
        if description.contains("boom") {
            panic!("image backend crashed on '{}'", description);
        }
        Outcome::Failed("no image".to_string())
    }
}

struct FileProbe;

#[async_trait]
impl AudioProbe for FileProbe {
    async fn duration_seconds(&self, path: &Path) -> anyhow::Result<f64> {
        Ok(std::fs::read_to_string(path)?.trim().parse()?)
    }
}

#[derive(Default)]
struct RecordingRenderer {
    clips: Mutex<Vec<Clip>>,
    fps: Mutex<Option<u32>>,
}

#[async_trait]
impl ReelRenderer for RecordingRenderer {
    async fn render(&self, clips: &[Clip], out_mp4: &Path, fps: u32) -> anyhow::Result<()> {
        *self.clips.lock().unwrap() = clips.to_vec();
        *self.fps.lock().unwrap() = Some(fps);
        std::fs::write(out_mp4, b"fake mp4")?;
        Ok(())
    }
}

struct Harness {
    root: tempfile::TempDir,
    cfg: Config,
    images: Arc<DiskImages>,
    voices: Arc<DiskVoices>,
    renderer: Arc<RecordingRenderer>,
}

impl Harness {
    fn new(system_down: bool) -> Self {
        let root = tempfile::tempdir().unwrap();
        let font = root.path().join("font.ttf");
        std::fs::write(&font, b"ttf").unwrap();
        let cfg = Config {
            system_down,
            output_dir: root.path().join("output"),
            media_dir: root.path().join("media"),
            mock_voice_dir: root.path().join("mock"),
            font_path: font,
            max_concurrency: 2,
            ..Config::default()
        };
        std::fs::create_dir_all(&cfg.output_dir).unwrap();
        std::fs::create_dir_all(&cfg.media_dir).unwrap();
        std::fs::create_dir_all(&cfg.mock_voice_dir).unwrap();
        let images = Arc::new(DiskImages {
            dir: cfg.media_dir.clone(),
            calls: AtomicUsize::new(0),
        });
        let voices = Arc::new(DiskVoices {
            dir: cfg.media_dir.clone(),
            calls: AtomicUsize::new(0),
        });
        Self {
            root,
            cfg,
            images,
            voices,
            renderer: Arc::new(RecordingRenderer::default()),
        }
    }

    fn assembler(&self, script: Outcome<ScriptOutput>) -> VideoAssembler {
        self.assembler_with_images(script, self.images.clone())
    }

    fn assembler_with_images(&self, script: Outcome<ScriptOutput>, image: Arc<dyn ImageProvider>) -> VideoAssembler {
        let providers = Providers {
            script: Arc::new(FixedScript(script)),
            image,
            voice: self.voices.clone(),
        };
        VideoAssembler::new(&self.cfg, providers)
            .with_clip_builder(ParagraphClipBuilder::new(
                ClipStyle::from_config(&self.cfg),
                Arc::new(FileProbe),
            ))
            .with_renderer(self.renderer.clone())
    }

    fn rendered(&self) -> Vec<Clip> {
        self.renderer.clips.lock().unwrap().clone()
    }
}

fn script_of(paragraphs: &[(&str, &str)]) -> ScriptOutput {
    ScriptOutput {
        script: "Nature Adventure".to_string(),
        paragraphs: paragraphs
            .iter()
            .map(|(text, desc)| Paragraph::new(*text, *desc))
            .collect(),
        bg_track: "warm acoustic".to_string(),
    }
}

#[tokio::test]
async fn live_run_builds_one_clip_per_paragraph_in_order() {
    let h = Harness::new(false);
    let script = script_of(&[
        ("5.5|Step outside...", "misty forest"),
        ("4.25|Hear the river", "river at dawn"),
        ("3|Um, breathe", "mountain peak"),
        ("2.5|Go explore", "tent under stars"),
    ]);
    let out = h.cfg.output_dir.join("nature.mp4");
    let manifest = h.assembler(Outcome::Ready(script)).assemble_to("Nature Adventure", &out).await.unwrap();

    let clips = h.rendered();
    assert_eq!(clips.len(), 4);
    assert_eq!(manifest.clip_count, 4);
    assert_eq!(clips.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert_eq!(
        clips.iter().map(|c| c.duration).collect::<Vec<_>>(),
        vec![5.5, 4.25, 3.0, 2.5]
    );
    assert!((manifest.total_duration - 15.25).abs() < 1e-9);
    assert_eq!(*h.renderer.fps.lock().unwrap(), Some(24));

    for (clip, para) in clips.iter().zip(&manifest.script_data.paragraphs) {
        assert_eq!(Some(&clip.audio), para.voice_path.as_ref());
        assert!(matches!(&clip.visual, Visual::Image { path } if Some(path) == para.image_path.as_ref()));
    }

    assert_eq!(manifest.final_video, out);
    assert!(out.exists());
    assert_eq!(manifest.script_source, ScriptSource::Live);
    assert!(out.with_extension("json").exists());
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.voices.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn missing_image_falls_back_to_text_card() {
    let h = Harness::new(false);
    let script = script_of(&[
        ("2|First", "a meadow"),
        ("3|Second", "nothing to see"),
    ]);
    let out = h.cfg.output_dir.join("fallback.mp4");
    let manifest = h.assembler(Outcome::Ready(script)).assemble_to("Fallback", &out).await.unwrap();

    let clips = h.rendered();
    assert_eq!(clips.len(), 2);
    assert!(!clips[0].is_text_card());
    assert!(clips[1].is_text_card());
    assert_eq!(clips[1].duration, 3.0);
    assert!(manifest.script_data.paragraphs[1].image_path.is_none());
}

#[tokio::test]
async fn failed_script_stops_with_empty_script_error() {
    let h = Harness::new(false);
    let out = h.cfg.output_dir.join("empty.mp4");
    let err = h
        .assembler(Outcome::Failed("Gemini HTTP 503".to_string()))
        .assemble_to("Nature Adventure", &out)
        .await
        .unwrap_err();

    match err {
        PipelineError::EmptyScript { theme, title } => {
            assert_eq!(theme, "Nature Adventure");
            assert_eq!(title, "Failed to generate script.");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(h.rendered().is_empty());
    assert!(!out.exists());
    assert_eq!(h.voices.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disabled_script_sample_is_not_treated_as_failure() {
    let h = Harness::new(false);
    let mut sample = ScriptOutput::disabled_sample();
    // The fake voice reads the clip length from the narration prefix.
    sample.paragraphs[0].text = format!("1.5|{}", sample.paragraphs[0].text);
    let out = h.cfg.output_dir.join("sample.mp4");
    let manifest = h.assembler(Outcome::Disabled(sample)).assemble_to("anything", &out).await.unwrap();

    assert_eq!(manifest.script_source, ScriptSource::Disabled);
    assert_eq!(manifest.script_data.script, "[MOCK] Sample script");
    assert_eq!(manifest.clip_count, 1);
}

#[tokio::test]
async fn voice_failure_names_the_paragraph_and_renders_nothing() {
    let h = Harness::new(false);
    let script = script_of(&[
        ("2|Fine", "a"),
        ("2|Also fine", "b"),
        ("2|mute this one", "c"),
    ]);
    let out = h.cfg.output_dir.join("voice.mp4");
    let err = h.assembler(Outcome::Ready(script)).assemble_to("Voices", &out).await.unwrap_err();

    assert!(matches!(err, PipelineError::VoiceSynthesis { index: 2, .. }));
    assert!(err.to_string().contains("paragraph 3"));
    assert!(h.rendered().is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn mock_mode_bypasses_providers() {
    let h = Harness::new(true);
    let mock = MockDataSource::new(h.cfg.mock_voice_dir.clone());
    for i in 1..=MOCK_PARAGRAPH_COUNT {
        std::fs::write(mock.voice_path(i), "5").unwrap();
    }

    let manifest = h
        .assembler(Outcome::Failed("must not be called".to_string()))
        .assemble("Nature Adventure")
        .await
        .unwrap();

    assert_eq!(manifest.script_source, ScriptSource::Mock);
    assert_eq!(manifest.script_data.paragraphs.len(), MOCK_PARAGRAPH_COUNT);
    assert!(!manifest.final_video.as_os_str().is_empty());
    assert!(manifest.final_video.starts_with(&h.cfg.output_dir));
    assert!(
        manifest
            .final_video
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("nature-adventure_") && n.ends_with(".mp4"))
    );
    assert_eq!(manifest.total_duration, 5.0 * MOCK_PARAGRAPH_COUNT as f64);
    assert!(h.rendered().iter().all(Clip::is_text_card));
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.voices.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mock_mode_without_audio_fixtures_is_missing_audio() {
    let h = Harness::new(true);
    let out = h.root.path().join("output/mock.mp4");
    let err = h
        .assembler(Outcome::Failed("unused".to_string()))
        .assemble_to("Nature Adventure", &out)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Clip {
            index: 0,
            source: ClipError::MissingAudio { .. }
        }
    ));
    assert!(h.rendered().is_empty());
}

#[tokio::test]
async fn missing_font_aborts_the_run() {
    let mut h = Harness::new(false);
    h.cfg.font_path = h.root.path().join("gone.ttf");
    let script = script_of(&[("2|Only text here", "nothing at all")]);
    let out = h.cfg.output_dir.join("font.mp4");
    let err = h.assembler(Outcome::Ready(script)).assemble_to("Fonts", &out).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Clip {
            index: 0,
            source: ClipError::MissingFontAsset { .. }
        }
    ));
    assert!(!out.exists());
}

#[tokio::test]
async fn configured_voice_file_is_numbered_per_paragraph() {
    let mut h = Harness::new(false);
    h.cfg.voice.output_file = Some(h.cfg.media_dir.join("narration.mp3"));
    let script = script_of(&[("5|one", "first"), ("2|two", "second")]);
    let out = h.cfg.output_dir.join("narrated.mp4");
    let manifest = h.assembler(Outcome::Ready(script)).assemble_to("Narration", &out).await.unwrap();

    let clips = h.rendered();
    assert_eq!(clips[0].audio, h.cfg.media_dir.join("narration_1.mp3"));
    assert_eq!(clips[1].audio, h.cfg.media_dir.join("narration_2.mp3"));
    assert_eq!(clips.iter().map(|c| c.duration).collect::<Vec<_>>(), vec![5.0, 2.0]);
    assert_eq!(manifest.total_duration, 7.0);
}

#[tokio::test]
async fn crashed_enrichment_task_names_its_own_paragraph() {
    let h = Harness::new(false);
    // Paragraph 1's voice is still sleeping when paragraph 2's image task dies.
    let script = script_of(&[("1|slow start", "calm lake"), ("5|quick", "boom")]);
    let out = h.cfg.output_dir.join("crash.mp4");
    let err = h
        .assembler_with_images(Outcome::Ready(script), Arc::new(ExplodingImages))
        .assemble_to("Crash", &out)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Enrichment { index: 1, .. }), "{:?}", err);
    assert_eq!(err.paragraph_index(), Some(1));
    assert!(err.to_string().starts_with("paragraph 2: enrichment task aborted"));
    assert!(h.rendered().is_empty());
    assert!(!out.exists());
}
