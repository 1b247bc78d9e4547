// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection session state.
//!
//! A [`Session`] is the relay's handle on one live transport. Producers (the
//! dispatcher, the retry engine, the registry on shutdown) only ever enqueue
//! into the session's channels; the session's delivery loop is the single
//! writer to the transport.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio_util::sync::CancellationToken;

use courier_core::{
    ClientId, ClientInfo, CourierError, Envelope, RecordKind, SessionId, Transport,
};

/// Capacity of the stop channel. One final message is all the loop sends.
pub(crate) const STOP_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the per-session send-outcome channel.
pub(crate) const OUTCOME_CHANNEL_CAPACITY: usize = 4096;

/// Result of writing one forwarded envelope to the transport.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub kind: RecordKind,
    pub msg_id: String,
    pub ok: bool,
}

/// Receiving halves handed to the session's delivery loop.
pub struct DeliveryQueues {
    pub(crate) outbound: mpsc::Receiver<Envelope>,
    pub(crate) stop: mpsc::Receiver<Envelope>,
    pub(crate) outcomes_tx: mpsc::Sender<SendOutcome>,
    pub(crate) outcomes_rx: mpsc::Receiver<SendOutcome>,
}

/// One connected client.
pub struct Session {
    id: SessionId,
    transport: Arc<dyn Transport>,
    identity: RwLock<Option<ClientInfo>>,
    outbound: mpsc::Sender<Envelope>,
    stop: mpsc::Sender<Envelope>,
    last_activity: Mutex<Instant>,
    closed: CancellationToken,
    enqueue_timeout: Duration,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session and the queues its delivery loop drains.
    pub fn new(
        id: SessionId,
        transport: Arc<dyn Transport>,
        queue_depth: usize,
        enqueue_timeout: Duration,
    ) -> (Self, DeliveryQueues) {
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_depth.max(1));
        let (stop_tx, stop_rx) = mpsc::channel(STOP_CHANNEL_CAPACITY);
        let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);

        let session = Self {
            id,
            transport,
            identity: RwLock::new(None),
            outbound: outbound_tx,
            stop: stop_tx,
            last_activity: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
            enqueue_timeout,
            created_at: Utc::now(),
        };
        let queues = DeliveryQueues {
            outbound: outbound_rx,
            stop: stop_rx,
            outcomes_tx,
            outcomes_rx,
        };
        (session, queues)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Bound identity, `None` until a Hello is accepted.
    pub fn client_id(&self) -> Option<ClientId> {
        self.read_identity().as_ref().map(|i| i.client_id.clone())
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.read_identity().clone()
    }

    /// Only the registry binds identities, under its lock.
    pub(crate) fn set_identity(&self, info: ClientInfo) {
        *self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(info);
    }

    fn read_identity(&self) -> std::sync::RwLockReadGuard<'_, Option<ClientInfo>> {
        self.identity.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueues an envelope for delivery.
    ///
    /// Waits at most the configured enqueue timeout for queue space and then
    /// fails with [`CourierError::Timeout`]. A closed session fails with a
    /// transport error.
    pub async fn queue_out(&self, envelope: Envelope) -> Result<(), CourierError> {
        if self.is_closed() {
            return Err(CourierError::transport("session closed"));
        }
        self.outbound
            .send_timeout(envelope, self.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => CourierError::Timeout {
                    duration: self.enqueue_timeout,
                },
                SendTimeoutError::Closed(_) => CourierError::transport("session closed"),
            })
    }

    /// Pushes a final envelope onto the stop channel, bypassing the outbound
    /// queue. Returns false when a stop is already pending or the loop is gone.
    pub fn stop(&self, envelope: Envelope) -> bool {
        match self.stop.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Marks the session closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Records inbound activity.
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last inbound envelope.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("client_id", &self.client_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
