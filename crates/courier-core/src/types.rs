// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Courier relay.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Schema tag written into every persisted record.
pub const RECORD_VERSION: &str = "v1.0";

/// Unique identifier for a live session (`session-<n>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Unique identifier for a message (`msg-<n>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

/// Identity a client registers with on Hello.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Wire protocol a session arrived on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ProtocolKind {
    #[default]
    Unset,
    StreamingRpc,
    WebSocket,
    LongPoll,
}

/// Registration metadata carried by a Hello envelope and bound to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub name: String,
    pub version: String,
    pub description: String,
    pub allowed_command_ids: BTreeMap<i64, String>,
}

/// Delivery status of a persisted record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum RecordStatus {
    Queued,
    Succeeded,
    Failed,
    Retrying,
}

impl RecordStatus {
    /// Whether a record may move from `self` to `next`.
    ///
    /// Failed→Failed is allowed: an offline retry bumps the counter without
    /// leaving the Failed state.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, next),
            (Queued, Succeeded)
                | (Queued, Failed)
                | (Failed, Retrying)
                | (Failed, Failed)
                | (Retrying, Succeeded)
                | (Retrying, Failed)
        )
    }

    /// Terminal records are purged by the cleanup engine.
    pub fn is_terminal(self) -> bool {
        self == RecordStatus::Succeeded
    }
}

/// Which pending table a record lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum RecordKind {
    Request,
    Response,
}

/// A forwarded request or response persisted for store-and-forward delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    /// Storage surrogate key. Zero until inserted.
    pub id: i64,
    pub version: String,
    /// Relay-generated id of the forwarded envelope.
    pub msg_id: String,
    /// `reqid` or `respid` chosen by the originator.
    pub correlation_id: String,
    pub from: String,
    pub to: String,
    /// JSON of the forwarded envelope, replayed as-is on retry.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub retries: u32,
    pub status: RecordStatus,
}

impl MessageRecord {
    /// Builds an unsaved record that expires `ttl` from now.
    pub fn new(
        msg_id: impl Into<String>,
        correlation_id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        content: impl Into<String>,
        status: RecordStatus,
        ttl: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            version: RECORD_VERSION.to_string(),
            msg_id: msg_id.into(),
            correlation_id: correlation_id.into(),
            from: from.into(),
            to: to.into(),
            content: content.into(),
            created_at: now,
            expires_at: now + ttl,
            retries: 0,
            status,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Transport,
    Observability,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings_match_persisted_form() {
        assert_eq!(RecordStatus::Queued.to_string(), "Queued");
        assert_eq!(RecordStatus::Retrying.to_string(), "Retrying");
        assert_eq!(
            RecordStatus::from_str("Succeeded").unwrap(),
            RecordStatus::Succeeded
        );
        assert!(RecordStatus::from_str("Delivered").is_err());
    }

    #[test]
    fn succeeded_is_final() {
        for next in [
            RecordStatus::Queued,
            RecordStatus::Succeeded,
            RecordStatus::Failed,
            RecordStatus::Retrying,
        ] {
            assert!(!RecordStatus::Succeeded.can_transition_to(next));
        }
    }

    #[test]
    fn allowed_transitions() {
        use RecordStatus::*;
        assert!(Queued.can_transition_to(Succeeded));
        assert!(Queued.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Retrying));
        assert!(Retrying.can_transition_to(Succeeded));
        assert!(Retrying.can_transition_to(Failed));

        assert!(!Queued.can_transition_to(Retrying));
        assert!(!Failed.can_transition_to(Succeeded));
        assert!(!Retrying.can_transition_to(Queued));
    }

    #[test]
    fn new_record_starts_unsaved() {
        let rec = MessageRecord::new(
            "msg-1",
            "r1",
            "alice",
            "bob",
            "{}",
            RecordStatus::Failed,
            chrono::Duration::minutes(600),
        );
        assert_eq!(rec.id, 0);
        assert_eq!(rec.retries, 0);
        assert_eq!(rec.version, RECORD_VERSION);
        assert!(!rec.is_expired(Utc::now()));
        assert!(rec.is_expired(rec.expires_at + chrono::Duration::seconds(1)));
    }
}
