// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session delivery loop and the shared enqueue path.
//!
//! The loop is the only writer to a session's transport. It waits, in
//! priority order, on the stop channel, session closure, the outbound queue
//! and the send-outcome channel. Outcomes of forwarded envelopes are folded
//! back into the persisted record status.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use courier_core::{CourierError, Envelope, RecordStatus, StorageAdapter};

use crate::session::{DeliveryQueues, SendOutcome, Session};

/// Enqueues `envelope` on `target`'s outbound queue.
///
/// This is the one "deliver to session" step shared by the dispatcher and the
/// retry engine. Fails fast when the queue stays full past the enqueue
/// timeout.
pub async fn enqueue_for_delivery(
    target: &Session,
    envelope: Envelope,
) -> Result<(), CourierError> {
    let msg_id = envelope.msg_id.clone();
    let result = target.queue_out(envelope).await;
    if let Err(e) = &result {
        if matches!(e, CourierError::Timeout { .. }) {
            #[cfg(feature = "prometheus")]
            courier_prometheus::record_enqueue_timeout();
        }
        debug!(session = %target.id(), msg_id = %msg_id, error = %e, "enqueue failed");
    }
    result
}

/// Drives one session's outbound side until the session stops.
pub struct DeliveryLoop {
    session: Arc<Session>,
    queues: DeliveryQueues,
    storage: Arc<dyn StorageAdapter>,
}

impl DeliveryLoop {
    pub fn new(
        session: Arc<Session>,
        queues: DeliveryQueues,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        Self {
            session,
            queues,
            storage,
        }
    }

    /// Runs until a stop message, session closure or a write failure.
    ///
    /// On exit the session is closed, pending outcomes are recorded and every
    /// forwarded envelope still queued is marked Failed so the retry engine
    /// picks it up.
    pub async fn run(mut self) {
        let session = Arc::clone(&self.session);
        debug!(session = %session.id(), "delivery loop started");

        loop {
            tokio::select! {
                biased;

                Some(last) = self.queues.stop.recv() => {
                    self.send_final(last).await;
                    break;
                }
                _ = session.closed() => break,
                next = self.queues.outbound.recv() => {
                    let Some(envelope) = next else { break };
                    if !self.write(envelope).await {
                        break;
                    }
                }
                Some(outcome) = self.queues.outcomes_rx.recv() => {
                    self.record_outcome(outcome).await;
                }
            }
        }

        session.close();
        self.drain().await;
        debug!(session = %session.id(), "delivery loop stopped");
    }

    /// Writes one envelope. Returns false when the transport failed.
    async fn write(&mut self, envelope: Envelope) -> bool {
        let forwarded = envelope.record_kind();
        match self.session.transport().send(&envelope).await {
            Ok(()) => {
                if let Some(kind) = forwarded {
                    self.push_outcome(SendOutcome {
                        kind,
                        msg_id: envelope.msg_id,
                        ok: true,
                    })
                    .await;
                }
                true
            }
            Err(e) => {
                warn!(
                    session = %self.session.id(),
                    msg_id = %envelope.msg_id,
                    error = %e,
                    "write failed, closing session"
                );
                if let Some(kind) = forwarded {
                    self.record_outcome(SendOutcome {
                        kind,
                        msg_id: envelope.msg_id,
                        ok: false,
                    })
                    .await;
                }
                false
            }
        }
    }

    async fn send_final(&self, envelope: Envelope) {
        debug!(session = %self.session.id(), kind = envelope.kind(), "sending final message");
        if let Err(e) = self.session.transport().send(&envelope).await {
            debug!(session = %self.session.id(), error = %e, "final message not delivered");
        }
    }

    async fn push_outcome(&self, outcome: SendOutcome) {
        match self.queues.outcomes_tx.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Full(outcome)) | Err(TrySendError::Closed(outcome)) => {
                self.record_outcome(outcome).await;
            }
        }
    }

    /// Folds a send outcome into the persisted record.
    async fn record_outcome(&self, outcome: SendOutcome) {
        #[cfg(feature = "prometheus")]
        courier_prometheus::record_delivery(outcome.ok);

        apply_outcome(self.storage.as_ref(), outcome).await;
    }

    async fn drain(&mut self) {
        while let Ok(outcome) = self.queues.outcomes_rx.try_recv() {
            self.record_outcome(outcome).await;
        }

        self.queues.outbound.close();
        let mut abandoned = 0usize;
        while let Ok(envelope) = self.queues.outbound.try_recv() {
            if let Some(kind) = envelope.record_kind() {
                abandoned += 1;
                apply_outcome(
                    self.storage.as_ref(),
                    SendOutcome {
                        kind,
                        msg_id: envelope.msg_id,
                        ok: false,
                    },
                )
                .await;
            }
        }
        if abandoned > 0 {
            debug!(session = %self.session.id(), abandoned, "queued messages left for retry");
        }
    }
}

/// Moves the record behind `outcome` to Succeeded or Failed, if that
/// transition is allowed from its current status.
pub(crate) async fn apply_outcome(storage: &dyn StorageAdapter, outcome: SendOutcome) {
    let next = if outcome.ok {
        RecordStatus::Succeeded
    } else {
        RecordStatus::Failed
    };

    let mut record = match storage.get_by_kind(outcome.kind, &outcome.msg_id).await {
        Ok(record) => record,
        Err(CourierError::NotFound { .. }) => {
            debug!(msg_id = %outcome.msg_id, "no record for delivered message");
            return;
        }
        Err(e) => {
            warn!(msg_id = %outcome.msg_id, error = %e, "failed to load record for outcome");
            return;
        }
    };

    if !record.status.can_transition_to(next) {
        debug!(
            msg_id = %outcome.msg_id,
            from = %record.status,
            to = %next,
            "ignoring outcome"
        );
        return;
    }

    record.status = next;
    if let Err(e) = storage.update_by_kind(outcome.kind, &record).await {
        warn!(msg_id = %outcome.msg_id, error = %e, "failed to record delivery outcome");
    }
}
