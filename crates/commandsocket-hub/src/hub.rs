//! Multi-client hub with primary arbitration.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use commandsocket_core::{
    CORRELATION_CAPACITY, ClientState, CodecError, Correlated, HostStatus, HubRequest,
    HubResponse, PendingTable, StatePush,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Hub configuration.
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    /// Enables the encrypted codec when set.
    pub password: Option<String>,
    /// Sticky mode: the first-focused client keeps primary status across
    /// competing focus reports until it disconnects.
    pub sticky: bool,
}

/// Events delivered to the host application.
#[derive(Debug)]
pub enum HubEvent {
    /// Number of connected clients changed.
    ClientCount(usize),
    Status(HostStatus),
    /// State of the primary client changed. Carries the default snapshot
    /// when the primary disconnects.
    PrimaryState(Box<ClientState>),
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single [`Hub::request`] call.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no primary client")]
    NoPrimary,
    #[error("request evicted before a response arrived")]
    Evicted,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

struct ClientRecord {
    state: ClientState,
    outbound: mpsc::UnboundedSender<String>,
}

struct Registry {
    clients: HashMap<u64, ClientRecord>,
    primary: Option<u64>,
    next_client_id: u64,
    /// Process-wide monotonic request counter. Never recycled; the hub is
    /// long-lived and one counter is cheap relative to pending promises.
    next_request_id: u64,
    pending: PendingTable<oneshot::Sender<HubResponse>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            clients: HashMap::new(),
            primary: None,
            next_client_id: 0,
            next_request_id: 0,
            pending: PendingTable::new(CORRELATION_CAPACITY),
        }
    }
}

struct ListenerTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Accepts editor connections and arbitrates which one is authoritative.
///
/// All mutable state lives on the instance; independent hubs can coexist.
pub struct Hub {
    config: HubConfig,
    events: mpsc::UnboundedSender<HubEvent>,
    registry: Arc<Mutex<Registry>>,
    listener: Mutex<Option<ListenerTask>>,
}

impl Hub {
    pub fn new(config: HubConfig, events: mpsc::UnboundedSender<HubEvent>) -> Self {
        Self {
            config,
            events,
            registry: Arc::new(Mutex::new(Registry::new())),
            listener: Mutex::new(None),
        }
    }

    /// Bind and start accepting clients, tearing down any previous
    /// listener first. Returns the bound address.
    ///
    /// A bind failure is a configuration problem, reported as
    /// `HostStatus::BadConfig` alongside the error.
    pub async fn listen(&self, host: &str, port: u16) -> Result<SocketAddr, HubError> {
        self.stop().await;

        let listener = match TcpListener::bind((host, port)).await {
            Ok(listener) => listener,
            Err(source) => {
                let addr = format!("{host}:{port}");
                tracing::error!(%addr, error = %source, "unable to start hub");
                let _ = self.events.send(HubEvent::Status(HostStatus::BadConfig));
                return Err(HubError::Bind { addr, source });
            }
        };
        let addr = listener
            .local_addr()
            .map_err(|source| HubError::Bind {
                addr: format!("{host}:{port}"),
                source,
            })?;
        tracing::info!("listening on ws://{}", addr);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(accept_loop(
            listener,
            self.config.clone(),
            self.registry.clone(),
            self.events.clone(),
            shutdown_rx,
        ));
        *self.listener.lock().await = Some(ListenerTask { handle, shutdown });

        Ok(addr)
    }

    /// Send a request to the current primary and await its response.
    ///
    /// Rejects immediately when no primary is selected. When the pending
    /// table exceeds its capacity, every outstanding request is rejected
    /// at once before this one proceeds.
    pub async fn request(&self, request: HubRequest) -> Result<HubResponse, RequestError> {
        // Assign the id and grab the primary's writer under the lock, but
        // run the slow per-message key derivation outside it so inbound
        // frame handling is not stalled while scrypt churns.
        let (id, outbound) = {
            let mut registry = self.registry.lock().await;

            if registry.pending.len() > CORRELATION_CAPACITY {
                let dropped = registry.pending.drain();
                tracing::warn!(
                    count = dropped.len(),
                    "correlation table overflow, rejecting all pending requests"
                );
            }

            let Some(primary_id) = registry.primary else {
                return Err(RequestError::NoPrimary);
            };
            let Some(record) = registry.clients.get(&primary_id) else {
                return Err(RequestError::NoPrimary);
            };
            let outbound = record.outbound.clone();

            let id = registry.next_request_id;
            registry.next_request_id += 1;
            (id, outbound)
        };

        let frame = commandsocket_core::encode(
            &Correlated { id, body: request },
            self.config.password.as_deref(),
        )?;

        // Register before writing so a fast response cannot arrive ahead
        // of its pending entry.
        let (tx, rx) = oneshot::channel();
        self.registry.lock().await.pending.register(id, tx);

        if outbound.send(frame).is_err() {
            self.registry.lock().await.pending.resolve(id);
            return Err(RequestError::NoPrimary);
        }

        rx.await.map_err(|_| RequestError::Evicted)
    }

    /// Stop listening, drop every client, and reject all pending requests.
    ///
    /// Idempotent; safe to call again while already stopped.
    pub async fn stop(&self) {
        let task = self.listener.lock().await.take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            let _ = task.handle.await;
        }

        let mut registry = self.registry.lock().await;
        registry.clients.clear();
        registry.primary = None;
        registry.next_request_id = 0;
        registry.pending.drain();
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: HubConfig,
    registry: Arc<Mutex<Registry>>,
    events: mpsc::UnboundedSender<HubEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, addr)) => {
                    let config = config.clone();
                    let registry = registry.clone();
                    let events = events.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, addr, config, registry, events, shutdown)
                                .await
                        {
                            tracing::warn!(%addr, error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            },
            _ = shutdown.changed() => return,
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    config: HubConfig,
    registry: Arc<Mutex<Registry>>,
    events: mpsc::UnboundedSender<HubEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let id = {
        let mut reg = registry.lock().await;
        let id = reg.next_client_id;
        reg.next_client_id += 1;
        reg.clients.insert(
            id,
            ClientRecord {
                state: ClientState::default(),
                outbound,
            },
        );
        let _ = events.send(HubEvent::ClientCount(reg.clients.len()));
        id
    };
    tracing::debug!(%addr, id, "client connected");

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(id, &text, &config, &registry, &events).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(id, error = %e, "socket error");
                    break;
                }
            },
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                // The hub dropped this record (stop or restart).
                None => break,
            },
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }

    disconnect(id, &registry, &events).await;
    tracing::debug!(%addr, id, "client disconnected");
    Ok(())
}

/// Demux one frame: correlated response or unsolicited state push.
async fn handle_frame(
    id: u64,
    text: &str,
    config: &HubConfig,
    registry: &Arc<Mutex<Registry>>,
    events: &mpsc::UnboundedSender<HubEvent>,
) {
    let value: Value = match commandsocket_core::decode(text, config.password.as_deref()) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(id, error = %e, "dropping undecodable frame");
            return;
        }
    };

    if value.get("id").is_some() {
        // Response to an outstanding request. Matching failures are not
        // errors; late or unknown ids are simply dropped.
        let Ok(response) = serde_json::from_value::<Correlated<HubResponse>>(value) else {
            return;
        };
        let mut reg = registry.lock().await;
        if let Some(tx) = reg.pending.resolve(response.id) {
            let _ = tx.send(response.body);
        }
        return;
    }

    let push: StatePush = match serde_json::from_value(value) {
        Ok(push) => push,
        Err(e) => {
            tracing::debug!(id, error = %e, "dropping malformed push");
            return;
        }
    };

    let mut reg = registry.lock().await;
    let Some(record) = reg.clients.get_mut(&id) else {
        return;
    };
    record.state.apply(&push);

    if let StatePush::Focus { focus: true } = push
        && !(config.sticky && reg.primary.is_some())
    {
        if reg.primary != Some(id) {
            tracing::info!(id, "primary client elected");
        }
        reg.primary = Some(id);
        let _ = events.send(HubEvent::Status(HostStatus::Ok));
    }

    // Only the authoritative client's pushes reach the host.
    if reg.primary == Some(id)
        && let Some(record) = reg.clients.get(&id)
    {
        let _ = events.send(HubEvent::PrimaryState(Box::new(record.state.clone())));
    }
}

async fn disconnect(
    id: u64,
    registry: &Arc<Mutex<Registry>>,
    events: &mpsc::UnboundedSender<HubEvent>,
) {
    let mut reg = registry.lock().await;
    if reg.clients.remove(&id).is_none() {
        // Already cleared by stop().
        return;
    }
    let _ = events.send(HubEvent::ClientCount(reg.clients.len()));

    if reg.primary == Some(id) {
        reg.primary = None;
        let _ = events.send(HubEvent::PrimaryState(Box::default()));
        let _ = events.send(HubEvent::Status(HostStatus::Disconnected));
    }
}
