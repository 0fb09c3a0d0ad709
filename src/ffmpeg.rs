use crate::clip::{Clip, FRAME_HEIGHT, FRAME_WIDTH, Visual};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::process::Command;

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd.output().await.context("Command execution failed")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let cut = stderr.char_indices().rev().nth(799).map(|(i, _)| i).unwrap_or(0);
        return Err(anyhow::anyhow!("Command failed: {} ({})", args[0], &stderr[cut..]));
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed for {}", path.display()));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.0 {
        return Err(anyhow::anyhow!("Invalid duration '{}'", text));
    }
    Ok(duration)
}

/// Escapes a path for use as a filter option value.
pub fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
        .replace(',', "\\,")
}

fn fade_filters(prefix: &str, fade: Option<f64>, duration: f64) -> String {
    match fade {
        Some(f) if f > 0.0 => format!(
            ",{p}=t=in:st=0:d={f:.3},{p}=t=out:st={s:.3}:d={f:.3}",
            p = prefix,
            f = f,
            s = (duration - f).max(0.0)
        ),
        _ => String::new(),
    }
}

/// The single `filter_complex` graph for a reel.
///
/// Input `2*i` is clip `i`'s visual and `2*i + 1` its audio. `text_files[i]`
/// must be `Some` for every text-card clip.
pub fn reel_filter_graph(clips: &[Clip], text_files: &[Option<PathBuf>], fps: u32) -> String {
    let mut graph = String::new();

    for (i, clip) in clips.iter().enumerate() {
        let d = clip.duration;
        let source = match (&clip.visual, text_files.get(i).and_then(|t| t.as_ref())) {
            (Visual::TextCard { font, font_size, .. }, Some(text_file)) => format!(
                "drawtext=fontfile={}:textfile={}:expansion=none:fontsize={}:fontcolor=black:line_spacing=10:\
box=1:boxcolor=white:boxborderw=16:x=(w-text_w)/2:y=(h-text_h)/2",
                escape_filter_path(font),
                escape_filter_path(text_file),
                font_size
            ),
            (Visual::TextCard { .. }, None) => "null".to_string(),
            (Visual::Image { .. }, _) => format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black",
                w = FRAME_WIDTH,
                h = FRAME_HEIGHT
            ),
        };

        let _ = write!(
            graph,
            "[{vi}:v]{src},setsar=1,fps={fps},format=yuv420p,trim=duration={d:.6},setpts=PTS-STARTPTS{fade}[v{i}];",
            vi = 2 * i,
            src = source,
            fps = fps,
            d = d,
            fade = fade_filters("fade", clip.fade, d),
            i = i
        );
        let _ = write!(
            graph,
            "[{ai}:a]aresample=44100,aformat=sample_fmts=fltp:channel_layouts=stereo,apad,atrim=0:{d:.6},asetpts=PTS-STARTPTS{fade}[a{i}];",
            ai = 2 * i + 1,
            d = d,
            fade = fade_filters("afade", clip.fade, d),
            i = i
        );
    }

    for i in 0..clips.len() {
        let _ = write!(graph, "[v{i}][a{i}]", i = i);
    }
    let _ = write!(graph, "concat=n={}:v=1:a=1[outv][outa]", clips.len());
    graph
}

pub fn reel_render_args(
    clips: &[Clip],
    text_files: &[Option<PathBuf>],
    fps: u32,
    out_mp4: &Path,
) -> Vec<String> {
    let mut args: Vec<String> = ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for clip in clips {
        let d = format!("{:.6}", clip.duration);
        match &clip.visual {
            Visual::Image { path } => args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                fps.to_string(),
                "-t".to_string(),
                d,
                "-i".to_string(),
                path.display().to_string(),
            ]),
            Visual::TextCard { background, .. } => args.extend([
                "-f".to_string(),
                "lavfi".to_string(),
                "-t".to_string(),
                d,
                "-i".to_string(),
                format!("color=c={}:s={}x{}:r={}", background, FRAME_WIDTH, FRAME_HEIGHT, fps),
            ]),
        }
        args.extend(["-i".to_string(), clip.audio.display().to_string()]);
    }

    args.extend([
        "-filter_complex".to_string(),
        reel_filter_graph(clips, text_files, fps),
        "-map".to_string(),
        "[outv]".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);
    args
}

pub async fn ffmpeg_render_reel(
    clips: &[Clip],
    text_files: &[Option<PathBuf>],
    fps: u32,
    out_mp4: &Path,
) -> Result<bool> {
    let args = reel_render_args(clips, text_files, fps, out_mp4);
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}
