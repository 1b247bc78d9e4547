// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound envelope dispatch.
//!
//! The dispatcher runs on the connection's read task. Every envelope a client
//! sends is handled here: identity registration, graceful leave, and
//! store-and-forward routing of requests and responses.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_core::envelope::Hello;
use courier_core::{
    Body, ClientId, CourierError, Envelope, MessageRecord, RecordStatus, Snowflake,
    StorageAdapter,
};

use crate::delivery::enqueue_for_delivery;
use crate::registry::SessionRegistry;
use crate::session::Session;

/// What the read loop should do after an envelope was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    Close,
}

/// Routes inbound envelopes.
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn StorageAdapter>,
    ids: Arc<Snowflake>,
    ttl: chrono::Duration,
    duplicate_grace: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn StorageAdapter>,
        ids: Arc<Snowflake>,
        ttl: chrono::Duration,
        duplicate_grace: Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            ids,
            ttl,
            duplicate_grace,
        }
    }

    /// Handles one envelope received on `session`.
    pub async fn dispatch(&self, session: &Arc<Session>, envelope: Envelope) -> Disposition {
        #[cfg(feature = "prometheus")]
        courier_prometheus::record_envelope(envelope.kind());

        debug!(
            session = %session.id(),
            msg_id = %envelope.msg_id,
            kind = envelope.kind(),
            "dispatching envelope"
        );

        match envelope.body {
            Body::Hello(ref hello) => self.on_hello(session, &envelope.msg_id, hello).await,
            Body::Leave(ref leave) => {
                info!(session = %session.id(), client_id = %leave.client_id, "client leaving");
                Disposition::Close
            }
            Body::Request(_) | Body::Response(_) => {
                self.forward(session, envelope).await;
                Disposition::Continue
            }
            Body::Ack(ref ack) => {
                debug!(
                    session = %session.id(),
                    quoted = %ack.msg_id,
                    is_ok = ack.is_ok,
                    msg = %ack.msg,
                    "client ack"
                );
                Disposition::Continue
            }
        }
    }

    /// Answers a frame that could not be decoded. The connection stays open.
    pub async fn reject_malformed(&self, session: &Session, error: &CourierError) {
        let reason = match error {
            CourierError::Protocol(reason) => reason.clone(),
            other => other.to_string(),
        };
        warn!(session = %session.id(), reason = %reason, "malformed inbound frame");
        self.reply(session, "", false, format!("Malformed message: {reason}"))
            .await;
    }

    async fn on_hello(&self, session: &Arc<Session>, msg_id: &str, hello: &Hello) -> Disposition {
        if hello.client_id.is_empty() {
            self.reply(session, msg_id, false, "Malformed message: empty client id")
                .await;
            return Disposition::Continue;
        }

        match self.registry.bind_identity(session, hello.client_info()) {
            Ok(()) => {
                info!(
                    session = %session.id(),
                    client_id = %hello.client_id,
                    client_name = %hello.client_name,
                    client_version = %hello.client_version,
                    "client registered"
                );
                self.reply(session, msg_id, true, "OK").await;
                Disposition::Continue
            }
            Err(owner) => {
                warn!(
                    session = %session.id(),
                    owner = %owner.id(),
                    client_id = %hello.client_id,
                    "duplicate client, dropping new connection"
                );
                self.reply(
                    session,
                    msg_id,
                    false,
                    format!(
                        "Duplicated client, Client [{}] already connected",
                        hello.client_id
                    ),
                )
                .await;
                tokio::time::sleep(self.duplicate_grace).await;
                Disposition::Close
            }
        }
    }

    /// Persists a forwarded copy of a Request or Response and hands it to the
    /// target session when one is online.
    async fn forward(&self, session: &Session, envelope: Envelope) {
        let (Some(kind), Some((correlation_id, from, to))) = (envelope.record_kind(), envelope.route())
        else {
            return;
        };

        let forwarded_id = match self.ids.new_message_id() {
            Ok(id) => id.0,
            Err(e) => {
                warn!(error = %e, "no id for forwarded message");
                self.reply(session, &envelope.msg_id, false, "Internal error, retry later")
                    .await;
                return;
            }
        };
        let forwarded = Envelope::new(forwarded_id, envelope.body.clone());
        let content = match forwarded.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(msg_id = %envelope.msg_id, error = %e, "failed to encode forwarded message");
                self.reply(session, &envelope.msg_id, false, "Internal error, retry later")
                    .await;
                return;
            }
        };

        let target = self.registry.get_by_identity(&ClientId::from(to));
        let status = if target.is_some() {
            RecordStatus::Queued
        } else {
            RecordStatus::Failed
        };

        let mut record = MessageRecord::new(
            forwarded.msg_id.as_str(),
            correlation_id,
            from,
            to,
            content,
            status,
            self.ttl,
        );
        let persisted = match self.storage.insert_by_kind(kind, &record).await {
            Ok(id) => {
                record.id = id;
                true
            }
            Err(e) => {
                warn!(msg_id = %record.msg_id, error = %e, "failed to persist forwarded message");
                false
            }
        };

        #[cfg(feature = "prometheus")]
        courier_prometheus::record_forwarded(match status {
            RecordStatus::Queued => "queued",
            _ => "failed",
        });

        let Some(target) = target else {
            info!(msg_id = %record.msg_id, from = %record.from, to = %record.to, "target offline, stored for retry");
            let msg = format!("Target Not Found, Please Online target [{}] first", record.to);
            self.reply(session, &envelope.msg_id, false, msg).await;
            return;
        };

        match enqueue_for_delivery(&target, forwarded).await {
            Ok(()) => {
                debug!(msg_id = %record.msg_id, to = %record.to, "forwarded");
                self.reply(session, &envelope.msg_id, true, "OK").await;
            }
            Err(e) => {
                warn!(msg_id = %record.msg_id, to = %record.to, error = %e, "target busy");
                if persisted {
                    record.status = RecordStatus::Failed;
                    if let Err(e) = self.storage.update_by_kind(kind, &record).await {
                        warn!(msg_id = %record.msg_id, error = %e, "failed to mark message failed");
                    }
                }
                let msg = format!(
                    "Target Busy, Client [{}] cannot accept messages now",
                    record.to
                );
                self.reply(session, &envelope.msg_id, false, msg).await;
            }
        }
    }

    /// Queues an Ack quoting `quoted` back to `session`.
    async fn reply(&self, session: &Session, quoted: &str, is_ok: bool, msg: impl Into<String>) {
        let msg_id = match self.ids.new_message_id() {
            Ok(id) => id.0,
            Err(e) => {
                warn!(error = %e, "no id for ack");
                String::new()
            }
        };
        let ack = Envelope::ack(msg_id, quoted, is_ok, msg);
        if let Err(e) = session.queue_out(ack).await {
            warn!(session = %session.id(), quoted = %quoted, error = %e, "ack dropped");
        }
    }
}
