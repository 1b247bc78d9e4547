// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport.
//!
//! Every text frame carries one JSON envelope:
//! ```json
//! {"msgid": "m-1", "req": {"reqid": "r-1", "from": "alice", "to": "bob", "content": "..."}}
//! ```
//!
//! A bare `1` text frame is a liveness probe. It is answered with `0` and
//! surfaced to the relay as a keepalive, like WebSocket ping and pong frames.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use courier_core::{CourierError, Envelope, Inbound, ProtocolKind, Transport};

use crate::server::GatewayState;

const PROBE: &str = "1";
const PROBE_REPLY: &str = "0";

/// A relay [`Transport`] over an axum WebSocket.
///
/// The socket is split so the relay's read task and the session's delivery
/// loop never contend for one lock.
pub struct WsTransport {
    addr: String,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
    closed: AtomicBool,
}

impl WsTransport {
    pub fn new(socket: WebSocket, addr: impl Into<String>) -> Self {
        let (sink, stream) = socket.split();
        Self {
            addr: addr.into(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed: AtomicBool::new(false),
        }
    }

    async fn send_text(&self, text: String) -> Result<(), CourierError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| CourierError::Transport {
                message: format!("websocket write to {} failed", self.addr),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::WebSocket
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), CourierError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CourierError::transport("websocket closed"));
        }
        self.send_text(envelope.to_json()?).await
    }

    async fn receive(&self) -> Result<Option<Inbound>, CourierError> {
        let frame = match self.stream.lock().await.next().await {
            None => return Ok(None),
            Some(Err(e)) => {
                return Err(CourierError::Transport {
                    message: format!("websocket read from {} failed", self.addr),
                    source: Some(Box::new(e)),
                });
            }
            Some(Ok(frame)) => frame,
        };

        match frame {
            Message::Text(text) if text.as_str() == PROBE => {
                self.send_text(PROBE_REPLY.to_string()).await?;
                Ok(Some(Inbound::Keepalive))
            }
            Message::Text(text) => {
                Envelope::from_json(text.as_str()).map(|e| Some(Inbound::Envelope(e)))
            }
            Message::Binary(bytes) => {
                let text =
                    std::str::from_utf8(&bytes).map_err(|e| CourierError::Protocol(e.to_string()))?;
                Envelope::from_json(text).map(|e| Some(Inbound::Envelope(e)))
            }
            Message::Close(_) => Ok(None),
            // axum answers pings itself.
            Message::Ping(_) | Message::Pong(_) => Ok(Some(Inbound::Keepalive)),
        }
    }

    async fn close(&self) -> Result<(), CourierError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(remote = %self.addr, error = %e, "close frame not sent");
        }
        let _ = sink.close().await;
        Ok(())
    }
}

/// WebSocket upgrade handler.
///
/// Hands the upgraded socket to the relay, which serves it until the client
/// leaves or the connection drops.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<GatewayState>,
) -> Response {
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let transport = Arc::new(WsTransport::new(socket, addr.to_string()));
            if let Err(e) = state.relay.serve_connection(transport).await {
                warn!(remote = %addr, error = %e, "connection rejected");
            }
        })
}
