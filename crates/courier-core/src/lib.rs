// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier store-and-forward relay.
//!
//! This crate provides the envelope model, persisted record types, the id
//! generator, the error type and the adapter traits implemented by storage
//! backends and wire transports.

pub mod envelope;
pub mod error;
pub mod id;
pub mod traits;
pub mod types;

pub use envelope::{Body, Envelope};
pub use error::CourierError;
pub use id::Snowflake;
pub use types::{
    AdapterType, ClientId, ClientInfo, HealthStatus, MessageId, MessageRecord, ProtocolKind,
    RecordKind, RecordStatus, SessionId,
};

pub use traits::{Inbound, PluginAdapter, StorageAdapter, Transport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn courier_error_has_all_variants() {
        let _config = CourierError::Config("test".into());
        let _storage = CourierError::storage(std::io::Error::other("test"));
        let _not_found = CourierError::NotFound {
            msg_id: "msg-1".into(),
        };
        let _transport = CourierError::transport("closed");
        let _protocol = CourierError::Protocol("bad frame".into());
        let _id = CourierError::IdGenerator("clock".into());
        let _timeout = CourierError::Timeout {
            duration: std::time::Duration::from_micros(50),
        };
        let _internal = CourierError::Internal("test".into());
    }

    #[test]
    fn only_protocol_errors_keep_the_connection() {
        assert!(CourierError::Protocol("x".into()).is_protocol());
        assert!(!CourierError::transport("x").is_protocol());
    }

    #[test]
    fn protocol_kind_round_trips_through_strings() {
        use std::str::FromStr;
        for kind in [
            ProtocolKind::Unset,
            ProtocolKind::StreamingRpc,
            ProtocolKind::WebSocket,
            ProtocolKind::LongPoll,
        ] {
            assert_eq!(ProtocolKind::from_str(&kind.to_string()).unwrap(), kind);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_transport<T: Transport>() {}
        fn _assert_object_safe(_: &dyn StorageAdapter, _: &dyn Transport) {}
    }
}
