// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the pending-message store.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageRecord, RecordKind};

/// Durable store for forwarded requests and responses awaiting delivery.
///
/// Requests and responses live in separate tables with identical shape.
/// The `*_by_kind` helpers route to the matching table so callers that
/// handle both kinds uniformly do not need to branch.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), CourierError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), CourierError>;

    /// Inserts a request record and returns its surrogate id.
    async fn insert_request(&self, record: &MessageRecord) -> Result<i64, CourierError>;

    /// Inserts a response record and returns its surrogate id.
    async fn insert_response(&self, record: &MessageRecord) -> Result<i64, CourierError>;

    /// Looks up a request by forwarded message id. Missing records yield
    /// [`CourierError::NotFound`].
    async fn get_request_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError>;

    async fn get_response_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError>;

    /// Rewrites every mutable column of the request with `record.id`.
    async fn update_request(&self, record: &MessageRecord) -> Result<(), CourierError>;

    async fn update_response(&self, record: &MessageRecord) -> Result<(), CourierError>;

    async fn delete_request(&self, id: i64) -> Result<(), CourierError>;

    async fn delete_response(&self, id: i64) -> Result<(), CourierError>;

    /// Deletes every Succeeded record and every record past its expiry, in
    /// both tables. Returns the number of rows purged.
    async fn delete_expired_or_succeeded(&self) -> Result<u64, CourierError>;

    /// Failed requests with `retries <= max_retries`, oldest first.
    async fn find_retryable_requests(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError>;

    async fn find_retryable_responses(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError>;

    async fn insert_by_kind(
        &self,
        kind: RecordKind,
        record: &MessageRecord,
    ) -> Result<i64, CourierError> {
        match kind {
            RecordKind::Request => self.insert_request(record).await,
            RecordKind::Response => self.insert_response(record).await,
        }
    }

    async fn get_by_kind(
        &self,
        kind: RecordKind,
        msg_id: &str,
    ) -> Result<MessageRecord, CourierError> {
        match kind {
            RecordKind::Request => self.get_request_by_msg_id(msg_id).await,
            RecordKind::Response => self.get_response_by_msg_id(msg_id).await,
        }
    }

    async fn update_by_kind(
        &self,
        kind: RecordKind,
        record: &MessageRecord,
    ) -> Result<(), CourierError> {
        match kind {
            RecordKind::Request => self.update_request(record).await,
            RecordKind::Response => self.update_response(record).await,
        }
    }

    async fn find_retryable_by_kind(
        &self,
        kind: RecordKind,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError> {
        match kind {
            RecordKind::Request => self.find_retryable_requests(max_retries).await,
            RecordKind::Response => self.find_retryable_responses(max_retries).await,
        }
    }
}
