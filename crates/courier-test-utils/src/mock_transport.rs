// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with injectable inbound frames and
//! captured outbound envelopes for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use courier_core::{CourierError, Envelope, Inbound, ProtocolKind, Transport};

/// One scripted inbound event.
#[derive(Debug, Clone)]
enum Frame {
    Envelope(Envelope),
    Keepalive,
    Malformed(String),
    Broken(String),
}

/// A mock connection for testing.
///
/// Provides two queues:
/// - **inbound**: frames injected via `inject()` and friends are returned by `receive()`
/// - **sent**: envelopes passed to `send()` are captured and retrievable via `sent()`
///
/// `receive()` blocks until a frame is injected or the transport is closed,
/// after which it reports end of stream.
pub struct MockTransport {
    addr: String,
    inbound: Mutex<VecDeque<Frame>>,
    sent: Mutex<Vec<Envelope>>,
    notify: Notify,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    fail_sends: AtomicBool,
}

impl MockTransport {
    /// Create a new mock transport with empty queues.
    pub fn new(addr: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.into(),
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Queue an envelope for the next `receive()`.
    pub async fn inject(&self, envelope: Envelope) {
        self.push(Frame::Envelope(envelope)).await;
    }

    /// Queue a keepalive frame.
    pub async fn inject_keepalive(&self) {
        self.push(Frame::Keepalive).await;
    }

    /// Queue a frame that fails to decode.
    pub async fn inject_malformed(&self, reason: impl Into<String>) {
        self.push(Frame::Malformed(reason.into())).await;
    }

    /// Queue a fatal read error.
    pub async fn inject_broken(&self, reason: impl Into<String>) {
        self.push(Frame::Broken(reason.into())).await;
    }

    async fn push(&self, frame: Frame) {
        self.inbound.lock().await.push_back(frame);
        self.notify.notify_one();
    }

    /// Make every subsequent `send()` fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Get all envelopes that were sent through `send()`.
    pub async fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Wait until at least `count` envelopes were sent, or `timeout` elapses.
    /// Returns whatever was sent by then.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<Envelope> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait until the transport has been closed, or `timeout` elapses.
    pub async fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_closed() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// How many times `close()` was called.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::WebSocket
    }

    fn remote_addr(&self) -> String {
        self.addr.clone()
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), CourierError> {
        if self.is_closed() {
            return Err(CourierError::transport("transport closed"));
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(CourierError::transport("injected send failure"));
        }
        self.sent.lock().await.push(envelope.clone());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Inbound>, CourierError> {
        loop {
            if self.is_closed() {
                return Ok(None);
            }
            {
                let mut queue = self.inbound.lock().await;
                if let Some(frame) = queue.pop_front() {
                    return match frame {
                        Frame::Envelope(env) => Ok(Some(Inbound::Envelope(env))),
                        Frame::Keepalive => Ok(Some(Inbound::Keepalive)),
                        Frame::Malformed(reason) => Err(CourierError::Protocol(reason)),
                        Frame::Broken(reason) => Err(CourierError::transport(reason)),
                    };
                }
            }
            self.notify.notified().await;
        }
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(())
    }
}
