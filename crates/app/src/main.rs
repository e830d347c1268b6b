use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use lingovox_app::config::AppConfig;
use lingovox_app::controller::{ConversationController, ConversationEvent};
use lingovox_app::pipeline::TurnPipeline;
use lingovox_audio::{CpalCaptureDevice, RodioPlayback};
use lingovox_services::OpenAiClient;
use lingovox_telemetry::PipelineMetrics;

/// Voice conversation trainer: speak, get a spoken reply, keep talking.
#[derive(Parser, Debug)]
#[command(name = "lingovox", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device name (host default input when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Language tag forwarded to transcription (e.g. "de")
    #[arg(long)]
    language: Option<String>,

    /// Persona/situation context forwarded to the dialogue service
    #[arg(long)]
    context: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.device = Some(device);
    }
    if let Some(language) = cli.language {
        config.language = language;
    }
    if let Some(context) = cli.context {
        config.context = context;
    }
    if config.services.api_key.is_empty() {
        anyhow::bail!("no API key configured; set LINGOVOX_API_KEY or services.api_key");
    }

    let metrics = Arc::new(PipelineMetrics::default());
    let client = Arc::new(
        OpenAiClient::new(config.services.clone()).context("building the service client")?,
    );
    let pipeline = Arc::new(TurnPipeline::new(
        client.clone(),
        client.clone(),
        client.clone(),
        config.language.clone(),
        metrics.clone(),
    ));
    let device = Arc::new(CpalCaptureDevice::new(config.device.clone()));
    let playback = Arc::new(RodioPlayback::new().context("opening audio output")?);

    let controller =
        ConversationController::new(device, playback, pipeline, &config, metrics.clone());
    let events = controller.sender();

    tokio::spawn(read_commands(events.clone()));
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            let _ = events.send(ConversationEvent::Shutdown).await;
        }
    });

    println!("lingovox — Enter: mic (start / commit / pause), p: pause, q: quit");
    controller.run().await;
    Ok(())
}

async fn read_commands(events: mpsc::Sender<ConversationEvent>) {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim() {
            "" => ConversationEvent::MicPressed,
            "p" => ConversationEvent::Pause,
            "q" => ConversationEvent::Shutdown,
            other => {
                println!("unknown command: {other:?}");
                continue;
            }
        };
        let quit = matches!(command, ConversationEvent::Shutdown);
        if events.send(command).await.is_err() || quit {
            break;
        }
    }
}
