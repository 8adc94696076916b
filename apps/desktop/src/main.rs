use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use board_store::DocumentConfigStore;
use clap::Parser;
use control_core::{Collaborators, DisabledChat, InteractiveController};
use interactive_integration::WsInteractiveConnector;
use shared::protocol::UiEvent;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod host;

use console::{parse_command, Command, HELP};

#[derive(Parser, Debug)]
struct Args {
    /// Settings file; missing is fine.
    #[arg(long, default_value = "interactive.toml")]
    settings: PathBuf,
    #[arg(long)]
    config_dir: Option<PathBuf>,
    #[arg(long)]
    ws_url: Option<String>,
    /// Start without opening the interactive session.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = config::load_settings(&args.settings)?;
    if let Some(config_dir) = args.config_dir {
        settings.config_dir = config_dir;
    }
    if let Some(ws_url) = args.ws_url {
        settings.ws_url = ws_url;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        ws_url = %settings.ws_url,
        config_dir = %settings.config_dir.display(),
        "desktop: starting"
    );

    let connector = WsInteractiveConnector::parse(&settings.ws_url)?;
    let controller = InteractiveController::new_with_dependencies(
        Arc::new(DocumentConfigStore::open(&settings.config_dir)),
        Arc::new(connector),
        Collaborators {
            effects: Arc::new(host::LoggingEffects),
            game_controls: Arc::new(host::LoggingGameControls),
            joystick: Arc::new(host::LoggingJoystick),
            chat: Arc::new(DisabledChat),
        },
        settings.controller_settings(),
    );

    let ui_task = tokio::spawn(log_ui_events(controller.subscribe_ui()));

    if !args.offline {
        if let Err(err) = controller.connect().await {
            warn!("desktop: initial connect failed: {err}");
        }
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("desktop: interrupted");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            None => {}
            Some(Err(message)) => println!("{message}\n{HELP}"),
            Some(Ok(Command::Trigger(control_id))) => {
                let _ = controller.manual_trigger(&control_id).await;
            }
            Some(Ok(Command::Reconnect)) => {
                if let Err(err) = controller.connect().await {
                    warn!("desktop: reconnect failed: {err}");
                }
            }
            Some(Ok(Command::Resync)) => {
                if let Err(err) = controller.resynchronize().await {
                    warn!("desktop: resync failed: {err}");
                }
            }
            Some(Ok(Command::Disconnect)) => controller.disconnect().await,
            Some(Ok(Command::Help)) => println!("{HELP}"),
            Some(Ok(Command::Quit)) => break,
        }
    }

    controller.disconnect().await;
    ui_task.abort();
    Ok(())
}

async fn log_ui_events(events: broadcast::Receiver<UiEvent>) {
    let mut events = BroadcastStream::new(events);
    while let Some(event) = events.next().await {
        match event {
            Ok(UiEvent::Connection(status)) => info!(?status, "ui: connection"),
            Ok(UiEvent::Error(err)) => error!(kind = ?err.kind, "ui: {err}"),
            Ok(UiEvent::EventLog(entry)) => {
                info!(username = %entry.username, "ui: {}", entry.event)
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "ui: event subscriber lagged")
            }
        }
    }
}
