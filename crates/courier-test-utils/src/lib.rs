// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides mock adapters for fast, deterministic tests without sockets or
//! a database file.
//!
//! # Components
//!
//! - [`MockTransport`] - scripted inbound frames and captured outbound envelopes
//! - [`MemoryStorage`] - in-memory [`courier_core::StorageAdapter`] with failure injection
//! - [`fixtures`] - envelope builders

pub mod fixtures;
pub mod memory_storage;
pub mod mock_transport;

pub use memory_storage::MemoryStorage;
pub use mock_transport::MockTransport;
