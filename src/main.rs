use std::error::Error;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::sync::mpsc;

use lingua_chat::config::{self, AppConfig};
use lingua_chat::context::AppContext;
use lingua_chat::network::ChatClient;
use lingua_chat::pipeline::{OfflineQueue, PersistenceClient};
use lingua_chat::ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "lingua_chat",
    version,
    about = "Language-learning chat with an AI tutor"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Flush the offline queue once (no UI) and exit
    Drain,
    /// Write the effective configuration to the config path and exit
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides();

    match cli.mode {
        Some(Mode::InitConfig) => {
            config::save_config(&cli.config, &app_config)?;
            log::info!("Wrote configuration to {}", cli.config);
            Ok(())
        }
        Some(Mode::Drain) => run_drain(app_config).await,
        None => run_full_client(app_config).await,
    }
}

async fn run_drain(app_config: AppConfig) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::initialize(app_config)?;
    let settings = ctx.config.pipeline_settings();
    let persistence = PersistenceClient::new(ctx.documents.clone(), settings.retry);
    let mut queue = OfflineQueue::load(ctx.kv.clone(), settings.queue_max_retries);

    if queue.is_empty() {
        log::info!("Offline queue is empty; nothing to do");
    } else {
        let report = queue.drain(&persistence).await;
        println!(
            "delivered {}, still queued {}, abandoned {}",
            report.delivered.len(),
            report.retained,
            report.abandoned
        );
    }

    ctx.shutdown().await;
    Ok(())
}

async fn run_full_client(app_config: AppConfig) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::initialize(app_config)?;
    let target_language = ctx.config.target_language.clone();

    // UI -> chat loop
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // Chat loop -> UI
    let (event_tx, event_rx) = mpsc::channel(512);

    let client = ChatClient::new(ctx.clone(), event_tx, cmd_rx, cmd_tx.clone());
    tokio::spawn(async move {
        if let Err(err) = client.run().await {
            log::error!("Chat loop terminated: {err}");
        }
    });

    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "Lingua Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("UI started (target language {target_language})");

            Ok(Box::new(ChatApp::new(cc, cmd_tx.clone(), event_receiver, &target_language)))
        }),
    )?;

    ctx.shutdown().await;
    Ok(())
}
