// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier relay.

use thiserror::Error;

/// The primary error type used across all Courier adapter traits and core operations.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A persisted record lookup matched nothing.
    #[error("record not found: {msg_id}")]
    NotFound { msg_id: String },

    /// Transport errors (socket closed, write failure). The session cannot continue.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A frame arrived that does not decode to exactly one envelope arm.
    /// The connection stays open.
    #[error("malformed message: {0}")]
    Protocol(String),

    /// The unique-ID generator could not produce an identifier.
    #[error("id generator error: {0}")]
    IdGenerator(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    /// Builds a transport failure without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the error is recoverable at the protocol level,
    /// meaning the originating connection should be kept.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}
