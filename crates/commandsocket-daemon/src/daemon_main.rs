//! Hub daemon: accepts editor clients and logs what the primary reports.
//!
//! Run: `commandsocket-daemon --port 6783 --password secret`

mod config;

use std::path::PathBuf;

use clap::Parser;
use commandsocket_hub::{Hub, HubConfig, HubEvent};
use config::DaemonConfig;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "commandsocket-daemon", about = "commandsocket hub daemon")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address (overrides the config file).
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Password for the encrypted codec (overrides the config file).
    #[arg(long, env = "COMMANDSOCKET_PASSWORD")]
    password: Option<String>,

    /// Keep the current primary across competing focus reports.
    #[arg(long)]
    sticky: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("commandsocket_daemon=info".parse()?)
                .add_directive("commandsocket_hub=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.password.is_some() {
        config.password = args.password;
    }
    if args.sticky {
        config.sticky = true;
    }

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let hub = Hub::new(
        HubConfig {
            password: config.password.clone(),
            sticky: config.sticky,
        },
        events_tx,
    );
    hub.listen(&config.bind, config.port).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(HubEvent::ClientCount(n)) => tracing::info!(clients = n, "client count changed"),
                Some(HubEvent::Status(status)) => tracing::info!(?status, "status changed"),
                Some(HubEvent::PrimaryState(state)) => tracing::info!(
                    version = %state.version,
                    workspace = %state.workspace_name,
                    branch = %state.git_branch,
                    editor = %state.editor_name,
                    commands = state.commands_count(),
                    "primary state changed"
                ),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                hub.stop().await;
                break;
            }
        }
    }

    Ok(())
}
