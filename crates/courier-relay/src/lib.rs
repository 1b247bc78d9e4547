// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-and-forward relay core.
//!
//! The [`Relay`] ties together:
//! - the [`SessionRegistry`] of live connections
//! - the [`Dispatcher`] that handles every inbound envelope
//! - one [`DeliveryLoop`] per session, the only writer to its transport
//! - the [`RetryEngine`] and [`CleanupEngine`] background tasks
//!
//! Transports hand connections to [`Relay::serve_connection`], which owns the
//! connection's read side until it ends.

pub mod cleanup;
pub mod delivery;
pub mod dispatcher;
pub mod registry;
pub mod retry;
pub mod session;
pub mod shutdown;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_config::model::RelayConfig;
use courier_core::{CourierError, Inbound, Snowflake, StorageAdapter, Transport};

pub use cleanup::CleanupEngine;
pub use delivery::{DeliveryLoop, enqueue_for_delivery};
pub use dispatcher::{Dispatcher, Disposition};
pub use registry::SessionRegistry;
pub use retry::{RetryEngine, RetryReport};
pub use session::Session;

/// How long a closing connection waits for its delivery loop to finish.
const DELIVERY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// The relay. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Relay {
    config: RelayConfig,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<Dispatcher>,
    storage: Arc<dyn StorageAdapter>,
    shutting_down: Arc<AtomicBool>,
}

impl Relay {
    /// Builds a relay over an initialized storage adapter.
    pub fn new(config: RelayConfig, storage: Arc<dyn StorageAdapter>, ids: Arc<Snowflake>) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&ids),
            config.max_outbound_queue_depth,
            config.enqueue_timeout(),
        ));
        let ttl = chrono::Duration::from_std(config.message_ttl())
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&storage),
            ids,
            ttl,
            config.duplicate_grace(),
        ));

        info!(
            node_id = config.node_id,
            max_retry_count = config.max_retry_count,
            queue_depth = config.max_outbound_queue_depth,
            "relay initialized"
        );

        Self {
            config,
            registry,
            dispatcher,
            storage,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn StorageAdapter> {
        &self.storage
    }

    pub fn retry_engine(&self) -> RetryEngine {
        RetryEngine::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.storage),
            self.config.max_retry_count,
            self.config.retry_interval(),
        )
    }

    pub fn cleanup_engine(&self) -> CleanupEngine {
        CleanupEngine::new(Arc::clone(&self.storage), self.config.cleanup_interval())
    }

    /// Spawns the retry and cleanup engines. Both stop when `cancel` fires.
    pub fn spawn_background(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let retry = self.retry_engine();
        let retry_cancel = cancel.clone();
        let cleanup = self.cleanup_engine();
        let cleanup_cancel = cancel.clone();

        vec![
            tokio::spawn(async move { retry.run(retry_cancel).await }),
            tokio::spawn(async move { cleanup.run(cleanup_cancel).await }),
        ]
    }

    /// Serves one connection until it ends.
    ///
    /// Registers a session, spawns its delivery loop and reads envelopes
    /// until EOF, a transport error, an idle timeout, a Leave, a rejected
    /// duplicate Hello or relay shutdown. Malformed frames are answered and
    /// the connection is kept.
    pub async fn serve_connection(&self, transport: Arc<dyn Transport>) -> Result<(), CourierError> {
        let (session, queues) = self.registry.new_session(Arc::clone(&transport))?;
        info!(
            session = %session.id(),
            remote = %session.remote_addr(),
            protocol = %transport.protocol(),
            "client connected"
        );

        let mut delivery = tokio::spawn(
            DeliveryLoop::new(Arc::clone(&session), queues, Arc::clone(&self.storage)).run(),
        );
        let idle = self.config.idle_session_timeout();

        loop {
            let received = tokio::select! {
                _ = session.closed() => break,
                received = tokio::time::timeout(idle, transport.receive()) => received,
            };

            match received {
                Err(_) => {
                    info!(session = %session.id(), idle_for = ?session.idle_for(), "idle session timed out");
                    break;
                }
                Ok(Ok(None)) => {
                    debug!(session = %session.id(), "peer closed connection");
                    break;
                }
                Ok(Ok(Some(Inbound::Keepalive))) => session.touch(),
                Ok(Ok(Some(Inbound::Envelope(envelope)))) => {
                    session.touch();
                    if self.dispatcher.dispatch(&session, envelope).await == Disposition::Close {
                        break;
                    }
                }
                Ok(Err(e)) if e.is_protocol() => {
                    session.touch();
                    self.dispatcher.reject_malformed(&session, &e).await;
                }
                Ok(Err(e)) => {
                    warn!(session = %session.id(), error = %e, "receive failed");
                    break;
                }
            }
        }

        self.registry.delete(&session);
        session.close();
        match tokio::time::timeout(DELIVERY_DRAIN_TIMEOUT, &mut delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(session = %session.id(), error = %e, "delivery loop panicked"),
            Err(_) => {
                warn!(session = %session.id(), "delivery loop did not stop, aborting");
                delivery.abort();
            }
        }
        if let Err(e) = transport.close().await {
            debug!(session = %session.id(), error = %e, "transport close failed");
        }

        info!(
            session = %session.id(),
            client_id = ?session.client_id().map(|c| c.0),
            "client disconnected"
        );
        Ok(())
    }

    /// Notifies every session that the relay is going away. Idempotent and
    /// does not wait.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            debug!("relay shutdown already requested");
            return;
        }
        info!("relay shutting down");
        self.registry.shutdown();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ClientId;
    use courier_test_utils::{MemoryStorage, MockTransport, fixtures};

    fn relay() -> Relay {
        Relay::new(
            RelayConfig::default(),
            Arc::new(MemoryStorage::new()),
            Arc::new(Snowflake::new(9).unwrap()),
        )
    }

    #[tokio::test]
    async fn eof_removes_session() {
        let relay = relay();
        let transport = MockTransport::new("a");
        let task = {
            let relay = relay.clone();
            let transport = transport.clone();
            tokio::spawn(async move { relay.serve_connection(transport).await })
        };

        transport.inject(fixtures::hello("h1", "alice")).await;
        transport.wait_for_sent(1, Duration::from_secs(1)).await;
        assert_eq!(relay.registry().len(), 1);

        transport.close().await.unwrap();
        task.await.unwrap().unwrap();
        assert!(relay.registry().is_empty());
        assert!(relay.registry().get_by_identity(&ClientId::from("alice")).is_none());
    }

    #[tokio::test]
    async fn oversized_expiry_builds_a_relay() {
        let config = RelayConfig {
            message_expire_mins: u64::MAX / 2,
            cleanup_interval_mins: u64::MAX / 2,
            retry_interval_secs: u64::MAX,
            ..RelayConfig::default()
        };
        let relay = Relay::new(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(Snowflake::new(9).unwrap()),
        );
        let cancel = CancellationToken::new();
        let engines = relay.spawn_background(&cancel);
        tokio::task::yield_now().await;
        cancel.cancel();
        for engine in engines {
            engine.await.unwrap();
        }
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let relay = relay();
        relay.shutdown();
        relay.shutdown();
        assert!(relay.is_shutting_down());
    }
}
