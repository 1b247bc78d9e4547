// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket gateway for the Courier relay.
//!
//! Accepts WebSocket connections on `/ws` and hands each one to
//! [`courier_relay::Relay::serve_connection`] as a [`WsTransport`]. Also
//! serves `/health` and, when the Prometheus exporter is enabled, `/metrics`.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{GatewayState, bind, router, serve};
pub use ws::WsTransport;
