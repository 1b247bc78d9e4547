// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live WebSocket round trips through the gateway and relay.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use courier_config::model::{GatewayConfig, RelayConfig};
use courier_core::{Body, Envelope, Snowflake};
use courier_gateway::GatewayState;
use courier_relay::Relay;
use courier_test_utils::{MemoryStorage, fixtures};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start() -> (String, Relay, CancellationToken) {
    start_with(RelayConfig::default()).await
}

async fn start_with(relay_config: RelayConfig) -> (String, Relay, CancellationToken) {
    let relay = Relay::new(
        relay_config,
        Arc::new(MemoryStorage::new()),
        Arc::new(Snowflake::new(4).unwrap()),
    );
    let config = GatewayConfig {
        port: 0,
        ..GatewayConfig::default()
    };
    let listener = courier_gateway::bind(&config).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let cancel = CancellationToken::new();

    let state = GatewayState::new(relay.clone(), &config);
    tokio::spawn(courier_gateway::serve(listener, state, cancel.clone()));
    (format!("ws://{addr}/ws"), relay, cancel)
}

async fn send(client: &mut Client, envelope: &Envelope) {
    client
        .send(Message::text(envelope.to_json().unwrap()))
        .await
        .unwrap();
}

async fn recv(client: &mut Client) -> Envelope {
    loop {
        let frame = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return Envelope::from_json(text.as_str()).unwrap();
        }
    }
}

async fn join(url: &str, client_id: &str) -> Client {
    let (mut client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    send(&mut client, &fixtures::hello("h", client_id)).await;
    let ack = recv(&mut client).await;
    assert!(fixtures::as_ack(&ack).unwrap().is_ok);
    client
}

#[tokio::test]
async fn request_travels_between_websocket_clients() {
    let (url, _relay, cancel) = start().await;
    let mut alice = join(&url, "alice").await;
    let mut bob = join(&url, "bob").await;

    send(
        &mut alice,
        &fixtures::request("a-1", "req-1", "alice", "bob", "hello bob"),
    )
    .await;

    let ack = recv(&mut alice).await;
    assert!(fixtures::as_ack(&ack).unwrap().is_ok);

    let delivered = recv(&mut bob).await;
    let Body::Request(req) = delivered.body else {
        panic!("expected a request");
    };
    assert_eq!(req.req_id, "req-1");
    assert_eq!(req.content, "hello bob");

    cancel.cancel();
}

#[tokio::test]
async fn malformed_frame_gets_negative_ack() {
    let (url, _relay, cancel) = start().await;
    let mut alice = join(&url, "alice").await;

    alice
        .send(Message::text(r#"{"msgid":"m1"}"#))
        .await
        .unwrap();
    let ack = recv(&mut alice).await;
    let ack = fixtures::as_ack(&ack).unwrap();
    assert!(!ack.is_ok);
    assert!(ack.msg.starts_with("Malformed message"));

    cancel.cancel();
}

#[tokio::test]
async fn probe_is_answered() {
    let (url, _relay, cancel) = start().await;
    let (mut client, _) = tokio_tungstenite::connect_async(&url).await.unwrap();

    client.send(Message::text("1")).await.unwrap();
    let frame = tokio::time::timeout(WAIT, client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame.to_text().unwrap(), "0");

    cancel.cancel();
}

#[tokio::test]
async fn liveness_frames_keep_session_past_idle_timeout() {
    let (url, relay, cancel) = start_with(RelayConfig {
        idle_session_timeout_secs: 2,
        ..RelayConfig::default()
    })
    .await;
    let mut alice = join(&url, "alice").await;

    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        alice.send(Message::text("1")).await.unwrap();
        let frame = tokio::time::timeout(WAIT, alice.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame.to_text().unwrap(), "0");
    }
    assert_eq!(relay.registry().len(), 1);

    // Silence past the window ends the session.
    let end = tokio::time::timeout(WAIT, async {
        loop {
            match alice.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(end.is_ok(), "idle session was not closed");

    cancel.cancel();
}

#[tokio::test]
async fn relay_shutdown_sends_leave() {
    let (url, relay, cancel) = start().await;
    let mut alice = join(&url, "alice").await;

    relay.shutdown();
    let leave = recv(&mut alice).await;
    assert_eq!(leave.kind(), "leave");

    cancel.cancel();
}
