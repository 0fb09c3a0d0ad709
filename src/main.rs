use ai_promo_reels::config::Config;
use ai_promo_reels::{VideoAssembler, init};
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let theme = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let theme = if theme.trim().is_empty() {
        "Nature Adventure".to_string()
    } else {
        theme
    };

    let config_path = std::env::var("REEL_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let cfg = Config::load_or_default(&config_path).await?;

    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        eprintln!("[WARNING] FFmpeg/ffprobe not found in PATH. Please install FFmpeg.");
    }
    init::check_font(&cfg);

    let assembler = VideoAssembler::from_config(&cfg)?;
    match assembler.assemble(&theme).await {
        Ok(manifest) => {
            println!("{}", manifest.to_json()?);
            Ok(())
        }
        Err(err) => {
            eprintln!("[ERROR] {}", err);
            std::process::exit(1);
        }
    }
}
