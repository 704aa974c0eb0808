//! Connection state machine tests against stub editor servers.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use commandsocket_client::{ClientConfig, ClientEvent, Connection, ConnectionState, HostStatus};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

async fn recv_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a client event")
        .expect("event channel closed")
}

async fn wait_status(events: &mut mpsc::UnboundedReceiver<ClientEvent>, want: HostStatus) {
    loop {
        if let ClientEvent::Status(status) = recv_event(events).await
            && status == want
        {
            return;
        }
    }
}

fn config(addr: SocketAddr, password: Option<&str>, reconnect: Option<Duration>) -> ClientConfig {
    ClientConfig {
        url: format!("ws://{addr}"),
        password: password.map(String::from),
        reconnect,
    }
}

/// Stub editor: accepts one socket, answers every request by echoing its
/// `reqID` as `resID` with a version field.
async fn spawn_version_server(password: Option<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let password = password.clone();
            tokio::spawn(async move {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut stream) = ws.split();
                while let Some(Ok(msg)) = stream.next().await {
                    if let Message::Text(text) = msg {
                        let request: Value =
                            commandsocket_core::decode(&text, password.as_deref()).unwrap();
                        assert_eq!(request["action"], "get-version");
                        let reply = json!({
                            "resID": request["reqID"],
                            "version": "1.2.3",
                        });
                        let frame =
                            commandsocket_core::encode(&reply, password.as_deref()).unwrap();
                        if sink.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn request_response_fires_exactly_once() {
    let addr = spawn_version_server(None).await;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config(addr, None, None), events_tx);
    wait_status(&mut events, HostStatus::Ok).await;
    assert_eq!(connection.state(), ConnectionState::Open);

    connection.send("get-version", json!({}));

    match recv_event(&mut events).await {
        ClientEvent::Response { action, payload } => {
            assert_eq!(action, "get-version");
            assert_eq!(payload["version"], "1.2.3");
            assert_eq!(payload["resID"], 0);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // The slot is free again; no duplicate delivery is pending.
    assert!(
        timeout(Duration::from_millis(200), events.recv())
            .await
            .is_err()
    );

    connection.shutdown().await;
}

#[tokio::test]
async fn encrypted_request_response() {
    let addr = spawn_version_server(Some("hunter2".into())).await;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config(addr, Some("hunter2"), None), events_tx);
    wait_status(&mut events, HostStatus::Ok).await;

    connection.send("get-version", json!({ "verbose": true }));

    match recv_event(&mut events).await {
        ClientEvent::Response { action, payload } => {
            assert_eq!(action, "get-version");
            assert_eq!(payload["version"], "1.2.3");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    connection.shutdown().await;
}

#[tokio::test]
async fn send_while_disconnected_is_dropped() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config(addr, None, None), events_tx);
    wait_status(&mut events, HostStatus::ConnectionFailure).await;

    connection.send("get-version", json!({}));
    assert!(
        timeout(Duration::from_millis(200), events.recv())
            .await
            .is_err()
    );

    connection.shutdown().await;
}

#[tokio::test]
async fn reconnects_after_the_configured_interval() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(
        config(addr, None, Some(Duration::from_millis(50))),
        events_tx,
    );

    wait_status(&mut events, HostStatus::Connecting).await;
    wait_status(&mut events, HostStatus::ConnectionFailure).await;
    let failed_at = Instant::now();

    // Second attempt starts only after the reconnect delay.
    wait_status(&mut events, HostStatus::Connecting).await;
    let elapsed = failed_at.elapsed();
    assert!(elapsed >= Duration::from_millis(45), "reconnected after {elapsed:?}");

    // Shutdown cancels the pending reconnect timer.
    connection.shutdown().await;
}

#[tokio::test]
async fn shutdown_allows_immediate_reconstruction() {
    let addr = spawn_version_server(None).await;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config(addr, None, None), events_tx);
    wait_status(&mut events, HostStatus::Ok).await;
    connection.shutdown().await;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let connection = Connection::connect(config(addr, None, None), events_tx);
    wait_status(&mut events, HostStatus::Ok).await;
    connection.send("get-version", json!({}));
    match recv_event(&mut events).await {
        ClientEvent::Response { action, .. } => assert_eq!(action, "get-version"),
        other => panic!("unexpected event: {other:?}"),
    }
    connection.shutdown().await;
}
