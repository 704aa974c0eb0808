//! The client-role connection state machine.

use std::pin::pin;
use std::time::Duration;

use commandsocket_core::{
    CORRELATION_CAPACITY, ClientRequest, ClientResponse, ConnectionState, CorrelationRing,
    HostStatus,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Configuration for one connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint, e.g. `ws://127.0.0.1:6783`.
    pub url: String,
    /// Enables the encrypted codec when set.
    pub password: Option<String>,
    /// Delay between reconnect attempts. `None` disables reconnection, in
    /// which case the connection terminates on the first close.
    pub reconnect: Option<Duration>,
}

/// Events delivered to the host application.
#[derive(Debug)]
pub enum ClientEvent {
    Status(HostStatus),
    /// A correlated response. `action` is the tag the request was sent
    /// with; `payload` is the full decoded response document.
    Response { action: String, payload: Value },
}

enum Command {
    Send { action: String, params: Value },
    Shutdown,
}

/// One outbound connection to an editor.
///
/// All socket I/O runs on a single spawned task, so reconnect scheduling is
/// cancel-then-arm by construction and can never double-fire.
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Start a connection. The first connect attempt is issued immediately.
    pub fn connect(config: ClientConfig, events: mpsc::UnboundedSender<ClientEvent>) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);
        let task = tokio::spawn(run(config, command_rx, events, state_tx));
        Self {
            commands,
            state,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Send a request. Dropped silently unless the connection is open;
    /// callers needing delivery guarantees must retry at a higher layer.
    ///
    /// `params` must be a JSON object (or null); its fields are merged into
    /// the outgoing message alongside `action` and `reqID`.
    pub fn send(&self, action: impl Into<String>, params: Value) {
        let action = action.into();
        if self.state() != ConnectionState::Open {
            tracing::debug!(%action, "dropping request while not open");
            return;
        }
        let params = match params {
            Value::Object(_) => params,
            Value::Null => Value::Object(Map::new()),
            other => {
                tracing::warn!(%action, ?other, "request params must be a JSON object");
                return;
            }
        };
        let _ = self.commands.send(Command::Send { action, params });
    }

    /// Close the socket, cancel any pending reconnect, and wait for the I/O
    /// task to release its resources. A fresh `Connection` may be built
    /// immediately after this returns.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

enum Exit {
    /// Peer closed the socket or the stream ended.
    Closed,
    /// Socket or write error.
    Error,
    /// Host requested shutdown.
    Shutdown,
}

async fn run(
    config: ClientConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ClientEvent>,
    state: watch::Sender<ConnectionState>,
) {
    let mut ring = CorrelationRing::new(CORRELATION_CAPACITY);

    'reconnect: loop {
        let _ = state.send(ConnectionState::Connecting);
        let _ = events.send(ClientEvent::Status(HostStatus::Connecting));

        let mut connect = pin!(connect_async(config.url.clone()));
        let connected = loop {
            tokio::select! {
                res = &mut connect => break res,
                cmd = commands.recv() => match cmd {
                    Some(Command::Send { action, .. }) => {
                        tracing::debug!(%action, "dropping request while connecting");
                    }
                    Some(Command::Shutdown) | None => {
                        let _ = state.send(ConnectionState::Closed);
                        return;
                    }
                }
            }
        };

        match connected {
            Ok((socket, _)) => {
                let _ = state.send(ConnectionState::Open);
                let _ = events.send(ClientEvent::Status(HostStatus::Ok));
                tracing::info!(url = %config.url, "connected");

                let exit = drive_open(
                    socket,
                    &mut commands,
                    &events,
                    &mut ring,
                    config.password.as_deref(),
                )
                .await;

                // Outstanding correlations die with the socket.
                ring.clear();
                let _ = state.send(ConnectionState::Closed);

                match exit {
                    Exit::Shutdown => return,
                    Exit::Closed => {
                        tracing::info!(url = %config.url, "disconnected");
                        let _ = events.send(ClientEvent::Status(HostStatus::Disconnected));
                    }
                    Exit::Error => {
                        let _ = events.send(ClientEvent::Status(HostStatus::ConnectionFailure));
                    }
                }
            }
            Err(e) => {
                // A failed attempt follows the same notify-and-reschedule
                // path as a runtime failure.
                tracing::debug!(url = %config.url, error = %e, "connect failed");
                let _ = state.send(ConnectionState::Closed);
                let _ = events.send(ClientEvent::Status(HostStatus::ConnectionFailure));
            }
        }

        let Some(delay) = config.reconnect else {
            return;
        };

        let mut sleep = pin!(tokio::time::sleep(delay));
        loop {
            tokio::select! {
                _ = &mut sleep => continue 'reconnect,
                cmd = commands.recv() => match cmd {
                    Some(Command::Send { action, .. }) => {
                        tracing::debug!(%action, "dropping request while disconnected");
                    }
                    Some(Command::Shutdown) | None => return,
                }
            }
        }
    }
}

async fn drive_open(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    ring: &mut CorrelationRing<String>,
    password: Option<&str>,
) -> Exit {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_frame(&text, ring, events, password),
                Some(Ok(Message::Close(_))) | None => return Exit::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "socket error");
                    return Exit::Error;
                }
            },
            cmd = commands.recv() => match cmd {
                Some(Command::Send { action, params }) => {
                    let req_id = ring.register(action.clone());
                    let request = ClientRequest { action, req_id, params };
                    match commandsocket_core::encode(&request, password) {
                        Ok(frame) => {
                            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                                tracing::debug!(error = %e, "write failed");
                                return Exit::Error;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "failed to encode request"),
                    }
                }
                Some(Command::Shutdown) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Exit::Shutdown;
                }
            }
        }
    }
}

fn handle_frame(
    text: &str,
    ring: &mut CorrelationRing<String>,
    events: &mpsc::UnboundedSender<ClientEvent>,
    password: Option<&str>,
) {
    let response: ClientResponse = match commandsocket_core::decode(text, password) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(error = %e, "dropping undecodable frame");
            return;
        }
    };

    let Some(action) = ring.take(response.res_id) else {
        tracing::debug!(id = response.res_id, "dropping response with unknown id");
        return;
    };

    let mut payload = response.fields;
    if let Value::Object(map) = &mut payload {
        map.insert("resID".into(), json!(response.res_id));
    }
    let _ = events.send(ClientEvent::Response { action, payload });
}
