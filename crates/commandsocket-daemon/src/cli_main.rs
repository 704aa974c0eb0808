//! One-shot client: connect to an editor, send a single action, print the
//! correlated response as JSON.
//!
//! Run: `commandsocket --url ws://127.0.0.1:6783 --action get-version`

use std::time::Duration;

use clap::Parser;
use commandsocket_client::{ClientConfig, ClientEvent, Connection, HostStatus};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "commandsocket", about = "commandsocket client CLI")]
struct Args {
    /// Editor endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:6783")]
    url: String,

    /// Password for the encrypted codec.
    #[arg(long, env = "COMMANDSOCKET_PASSWORD")]
    password: Option<String>,

    /// Action tag to send.
    #[arg(long)]
    action: String,

    /// Request parameters as a JSON object.
    #[arg(long, default_value = "{}")]
    params: String,

    /// How long to wait for the response, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("commandsocket_client=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let params: serde_json::Value = serde_json::from_str(&args.params)?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(
        ClientConfig {
            url: args.url,
            password: args.password,
            reconnect: None,
        },
        events_tx,
    );

    let result = tokio::time::timeout(Duration::from_millis(args.timeout), async {
        loop {
            match events.recv().await {
                Some(ClientEvent::Status(HostStatus::Ok)) => {
                    connection.send(args.action.as_str(), params.clone());
                }
                Some(ClientEvent::Status(HostStatus::ConnectionFailure)) => {
                    anyhow::bail!("connection failed");
                }
                Some(ClientEvent::Status(HostStatus::Disconnected)) => {
                    anyhow::bail!("disconnected before a response arrived");
                }
                Some(ClientEvent::Response { payload, .. }) => return Ok(payload),
                Some(_) => {}
                None => anyhow::bail!("connection task exited"),
            }
        }
    })
    .await;

    let outcome = match result {
        Ok(Ok(payload)) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(anyhow::anyhow!("timed out waiting for a response")),
    };

    connection.shutdown().await;
    outcome
}
