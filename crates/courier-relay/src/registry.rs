// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry.
//!
//! The registry is the only structure shared across connection tasks. It owns
//! one lock guarding both the session map and the identity index; the lock is
//! never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use courier_core::{ClientId, ClientInfo, CourierError, Envelope, SessionId, Snowflake, Transport};

use crate::session::{DeliveryQueues, Session};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, Arc<Session>>,
    by_identity: HashMap<ClientId, SessionId>,
}

/// Live sessions indexed by session id and by bound client identity.
pub struct SessionRegistry {
    ids: Arc<Snowflake>,
    inner: Mutex<Inner>,
    queue_depth: usize,
    enqueue_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(ids: Arc<Snowflake>, queue_depth: usize, enqueue_timeout: Duration) -> Self {
        Self {
            ids,
            inner: Mutex::new(Inner::default()),
            queue_depth,
            enqueue_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a session for a freshly connected transport and stores it.
    pub fn new_session(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<(Arc<Session>, DeliveryQueues), CourierError> {
        let id = self.ids.new_session_id()?;
        let (session, queues) =
            Session::new(id.clone(), transport, self.queue_depth, self.enqueue_timeout);
        let session = Arc::new(session);

        let live = {
            let mut inner = self.lock();
            inner.sessions.insert(id, Arc::clone(&session));
            inner.sessions.len()
        };
        publish_live(live);
        debug!(session = %session.id(), remote = %session.remote_addr(), "session registered");
        Ok((session, queues))
    }

    pub fn get_by_id(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.lock().sessions.get(id).cloned()
    }

    /// The live session bound to `client_id`, if any.
    pub fn get_by_identity(&self, client_id: &ClientId) -> Option<Arc<Session>> {
        let inner = self.lock();
        let id = inner.by_identity.get(client_id)?;
        inner
            .sessions
            .get(id)
            .filter(|s| !s.is_closed())
            .cloned()
    }

    /// Binds `info` to `session` unless another live session already owns
    /// the identity, in which case that session is returned.
    ///
    /// Rebinding the same identity on the owning session succeeds. Binding a
    /// different identity releases the session's previous one.
    pub fn bind_identity(
        &self,
        session: &Arc<Session>,
        info: ClientInfo,
    ) -> Result<(), Arc<Session>> {
        let mut inner = self.lock();

        if let Some(owner_id) = inner.by_identity.get(&info.client_id)
            && owner_id != session.id()
            && let Some(owner) = inner.sessions.get(owner_id)
            && !owner.is_closed()
        {
            return Err(Arc::clone(owner));
        }

        if let Some(previous) = session.client_id()
            && previous != info.client_id
            && inner.by_identity.get(&previous) == Some(session.id())
        {
            inner.by_identity.remove(&previous);
        }

        inner
            .by_identity
            .insert(info.client_id.clone(), session.id().clone());
        session.set_identity(info);
        Ok(())
    }

    /// Removes `session`. Idempotent; an identity already rebound to a newer
    /// session is left alone.
    pub fn delete(&self, session: &Session) {
        let (removed, live) = {
            let mut inner = self.lock();
            let removed = inner.sessions.remove(session.id()).is_some();
            if let Some(client_id) = session.client_id()
                && inner.by_identity.get(&client_id) == Some(session.id())
            {
                inner.by_identity.remove(&client_id);
            }
            (removed, inner.sessions.len())
        };
        if removed {
            publish_live(live);
            debug!(session = %session.id(), "session removed");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.lock().sessions.values().cloned().collect()
    }

    /// Pushes a synthetic Leave onto every session's stop channel. Does not
    /// wait for the delivery loops to exit.
    pub fn shutdown(&self) {
        let sessions = self.sessions();
        info!(count = sessions.len(), "notifying sessions of shutdown");
        for session in sessions {
            let msg_id = match self.ids.new_message_id() {
                Ok(id) => id.0,
                Err(e) => {
                    warn!(error = %e, "no id for shutdown leave");
                    String::new()
                }
            };
            let client_id = session.client_id().map(|c| c.0).unwrap_or_default();
            if !session.stop(Envelope::leave(msg_id, client_id)) {
                debug!(session = %session.id(), "stop already pending");
            }
        }
    }
}

#[cfg(feature = "prometheus")]
fn publish_live(count: usize) {
    courier_prometheus::set_live_sessions(count);
}

#[cfg(not(feature = "prometheus"))]
fn publish_live(_count: usize) {}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::MockTransport;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(Snowflake::new(1).unwrap()),
            8,
            Duration::from_micros(50),
        )
    }

    fn info(client: &str) -> ClientInfo {
        ClientInfo {
            client_id: ClientId::from(client),
            name: client.to_string(),
            version: "1.0".into(),
            description: String::new(),
            allowed_command_ids: Default::default(),
        }
    }

    #[tokio::test]
    async fn new_sessions_get_unique_ids() {
        let registry = registry();
        let (a, _qa) = registry.new_session(MockTransport::new("a")).unwrap();
        let (b, _qb) = registry.new_session(MockTransport::new("b")).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().0.starts_with("session-"));
        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get_by_id(a.id()).unwrap(), &a));
    }

    #[tokio::test]
    async fn second_identity_binding_conflicts() {
        let registry = registry();
        let (first, _q1) = registry.new_session(MockTransport::new("a")).unwrap();
        let (second, _q2) = registry.new_session(MockTransport::new("b")).unwrap();

        registry.bind_identity(&first, info("alice")).unwrap();
        let owner = registry.bind_identity(&second, info("alice")).unwrap_err();
        assert!(Arc::ptr_eq(&owner, &first));

        let found = registry.get_by_identity(&ClientId::from("alice")).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
        assert!(second.client_id().is_none());
    }

    #[tokio::test]
    async fn rebinding_on_owner_is_idempotent() {
        let registry = registry();
        let (session, _q) = registry.new_session(MockTransport::new("a")).unwrap();
        registry.bind_identity(&session, info("alice")).unwrap();
        registry.bind_identity(&session, info("alice")).unwrap();
        registry.bind_identity(&session, info("alicia")).unwrap();
        assert!(registry.get_by_identity(&ClientId::from("alice")).is_none());
        assert!(registry.get_by_identity(&ClientId::from("alicia")).is_some());
    }

    #[tokio::test]
    async fn closed_owner_does_not_block_binding() {
        let registry = registry();
        let (old, _q1) = registry.new_session(MockTransport::new("a")).unwrap();
        let (new, _q2) = registry.new_session(MockTransport::new("b")).unwrap();
        registry.bind_identity(&old, info("alice")).unwrap();
        old.close();

        assert!(registry.get_by_identity(&ClientId::from("alice")).is_none());
        registry.bind_identity(&new, info("alice")).unwrap();

        // Deleting the stale session must not unbind the new owner.
        registry.delete(&old);
        let found = registry.get_by_identity(&ClientId::from("alice")).unwrap();
        assert!(Arc::ptr_eq(&found, &new));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let registry = registry();
        let (session, _q) = registry.new_session(MockTransport::new("a")).unwrap();
        registry.bind_identity(&session, info("bob")).unwrap();
        registry.delete(&session);
        registry.delete(&session);
        assert!(registry.is_empty());
        assert!(registry.get_by_identity(&ClientId::from("bob")).is_none());
    }

    #[tokio::test]
    async fn shutdown_pushes_leave_to_every_session() {
        let registry = registry();
        let (a, mut qa) = registry.new_session(MockTransport::new("a")).unwrap();
        let (_b, mut qb) = registry.new_session(MockTransport::new("b")).unwrap();
        registry.bind_identity(&a, info("alice")).unwrap();

        registry.shutdown();
        registry.shutdown();

        let leave = qa.stop.recv().await.unwrap();
        assert_eq!(leave.kind(), "leave");
        assert!(leave.msg_id.starts_with("msg-"));
        assert_eq!(qb.stop.recv().await.unwrap().kind(), "leave");
        assert!(qa.stop.try_recv().is_err());
    }
}
