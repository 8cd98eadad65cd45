//! AdForge command-line runner.
//!
//! Usage: `adforge <brief.json> <video>...`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adforge_gemini::GeminiGateway;
use adforge_media::{check_ffmpeg, check_ffprobe, FfmpegDecoder};
use adforge_models::CreativeBrief;
use adforge_pipeline::{AdPipeline, PipelineConfig};

const USAGE: &str = "usage: adforge <brief.json> <video>...";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((brief_arg, video_args)) = args.split_first() else {
        bail!(USAGE);
    };
    if video_args.is_empty() {
        bail!(USAGE);
    }
    let brief_path = PathBuf::from(brief_arg);
    let videos: Vec<PathBuf> = video_args.iter().map(PathBuf::from).collect();

    check_ffmpeg()?;
    check_ffprobe()?;

    let brief: CreativeBrief = serde_json::from_slice(
        &tokio::fs::read(&brief_path)
            .await
            .with_context(|| format!("reading {}", brief_path.display()))?,
    )
    .with_context(|| format!("parsing {}", brief_path.display()))?;

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let gateway = GeminiGateway::from_env()?;
    info!(model = gateway.model(), "Completion gateway ready");

    let pipeline = AdPipeline::new(config, Arc::new(FfmpegDecoder::new()), Arc::new(gateway));

    for path in &videos {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        pipeline
            .upload(&path.to_string_lossy(), bytes)
            .await
            .with_context(|| format!("uploading {}", path.display()))?;
    }

    let run = pipeline.run(&brief).await?;
    println!("{}", serde_json::to_string_pretty(&run)?);

    info!("Run complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("adforge=info".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
