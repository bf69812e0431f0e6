//! # wisp-agent
//!
//! Console binary. Wires settings, the Gemini client, and the speech worker
//! into the turn engine, then bridges stdin and stdout to it.

#![deny(unsafe_code)]

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wisp_core::EventEmitter;
use wisp_core::constants::{NAME, VERSION};
use wisp_core::logging::{LogFormat, init_subscriber_with_format};
use wisp_llm::{GeminiConfig, GeminiService, GenerationService};
use wisp_runtime::{Engine, SpeechWorker};
use wisp_settings::{DataPaths, default_data_dir, load_settings};

use crate::console::{ConsoleInput, ConsoleSpeech};

/// Wisp agent console.
#[derive(Parser, Debug)]
#[command(name = "wisp-agent", about = "Wisp agent console")]
struct Cli {
    /// Data directory holding config, prompts, memory and the terminal.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (overrides settings; `RUST_LOG` overrides both).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let paths = DataPaths::new(args.data_dir.unwrap_or_else(default_data_dir));
    paths
        .ensure_dirs()
        .with_context(|| format!("Failed to create data directory: {}", paths.root().display()))?;
    let settings = load_settings(&paths).context("Failed to load settings")?;

    let level = args
        .log_level
        .unwrap_or_else(|| settings.log_level.clone());
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init_subscriber_with_format(&level, format);
    tracing::info!(name = NAME, version = VERSION, data_dir = %paths.root().display(), "starting");

    let service =
        GeminiService::connect(GeminiConfig::new(settings.model.clone()), &settings.api_key).await;
    tracing::info!(model = service.model(), ready = service.is_ready(), "generation service configured");
    let service: Arc<dyn GenerationService> = Arc::new(service);

    let cancel = CancellationToken::new();
    let agent_name = settings.agent_name.clone();
    let (events, mut event_rx) = EventEmitter::channel();
    let mut engine =
        Engine::open(paths, settings, service, events).context("Failed to start the turn engine")?;
    let (speech, speech_task) = SpeechWorker::spawn(Arc::new(ConsoleSpeech), cancel.clone());
    engine.set_speech(speech);

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let engine_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(control_rx, cancel).await }
    });
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if let Some(line) = console::render(&event, &agent_name) {
                println!("{line}");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else { break };
        match console::parse_line(&line) {
            Ok(ConsoleInput::Control(message)) => {
                if control_tx.send(message).is_err() {
                    break;
                }
            }
            Ok(ConsoleInput::Quit) => break,
            Ok(ConsoleInput::Nothing) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    tracing::info!("shutting down");
    cancel.cancel();
    let result = engine_task.await.context("Turn engine task panicked")?;
    let _ = speech_task.await;
    let _ = printer.await;
    result.context("Turn engine failed")
}
