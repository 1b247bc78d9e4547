// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait: one live client connection.

use async_trait::async_trait;

use crate::envelope::Envelope;
use crate::error::CourierError;
use crate::types::ProtocolKind;

/// One inbound read.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A decoded envelope for the dispatcher.
    Envelope(Envelope),
    /// Liveness traffic the transport already answered. Counts as activity.
    Keepalive,
}

/// A bidirectional connection carrying envelopes.
///
/// The transport owns wire encoding. `send` and `receive` may be called
/// concurrently from different tasks; implementations guard each direction
/// independently.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    fn protocol(&self) -> ProtocolKind;

    /// Peer address for logging.
    fn remote_addr(&self) -> String;

    /// Writes one envelope.
    async fn send(&self, envelope: &Envelope) -> Result<(), CourierError>;

    /// Reads the next envelope or keepalive.
    ///
    /// `Ok(None)` is a clean end of stream. [`CourierError::Protocol`] means a
    /// frame could not be decoded but the connection is still usable; any
    /// other error is fatal to the connection.
    async fn receive(&self) -> Result<Option<Inbound>, CourierError>;

    /// Closes the connection. Must be safe to call more than once.
    async fn close(&self) -> Result<(), CourierError>;
}
