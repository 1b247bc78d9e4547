// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory storage adapter with failure injection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use courier_core::{
    AdapterType, CourierError, HealthStatus, MessageRecord, PluginAdapter, RecordKind,
    RecordStatus, StorageAdapter,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    rows: HashMap<RecordKind, Vec<MessageRecord>>,
}

/// A `StorageAdapter` backed by two vectors.
///
/// `set_failing(true)` makes every call return a storage error, which lets
/// tests check that the live path proceeds when persistence is down.
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of one table, in insertion order.
    pub fn records(&self, kind: RecordKind) -> Vec<MessageRecord> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.rows.get(&kind).cloned().unwrap_or_default()
    }

    /// Insert a record as-is, bypassing failure injection. Returns its id.
    pub fn seed(&self, kind: RecordKind, record: MessageRecord) -> i64 {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.next_id += 1;
        let id = tables.next_id;
        tables
            .rows
            .entry(kind)
            .or_default()
            .push(MessageRecord { id, ..record });
        id
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, CourierError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CourierError::Storage {
                source: "injected storage failure".into(),
            });
        }
        self.tables
            .lock()
            .map_err(|_| CourierError::Internal("memory storage lock poisoned".into()))
    }

    fn insert(&self, kind: RecordKind, record: &MessageRecord) -> Result<i64, CourierError> {
        let mut tables = self.lock()?;
        let duplicate = tables
            .rows
            .get(&kind)
            .is_some_and(|rows| rows.iter().any(|r| r.msg_id == record.msg_id));
        if duplicate {
            return Err(CourierError::Storage {
                source: format!("duplicate msg_id {}", record.msg_id).into(),
            });
        }
        tables.next_id += 1;
        let id = tables.next_id;
        tables.rows.entry(kind).or_default().push(MessageRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    fn get(&self, kind: RecordKind, msg_id: &str) -> Result<MessageRecord, CourierError> {
        self.lock()?
            .rows
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r.msg_id == msg_id).cloned())
            .ok_or_else(|| CourierError::NotFound {
                msg_id: msg_id.to_string(),
            })
    }

    fn update(&self, kind: RecordKind, record: &MessageRecord) -> Result<(), CourierError> {
        let mut tables = self.lock()?;
        let row = tables
            .rows
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == record.id))
            .ok_or_else(|| CourierError::NotFound {
                msg_id: record.msg_id.clone(),
            })?;
        *row = record.clone();
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: i64) -> Result<(), CourierError> {
        if let Some(rows) = self.lock()?.rows.get_mut(&kind) {
            rows.retain(|r| r.id != id);
        }
        Ok(())
    }

    fn retryable(&self, kind: RecordKind, max: u32) -> Result<Vec<MessageRecord>, CourierError> {
        Ok(self
            .lock()?
            .rows
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.status == RecordStatus::Failed && r.retries <= max)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl PluginAdapter for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        if self.failing.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("injected failure".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn initialize(&self) -> Result<(), CourierError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        Ok(())
    }

    async fn insert_request(&self, record: &MessageRecord) -> Result<i64, CourierError> {
        self.insert(RecordKind::Request, record)
    }

    async fn insert_response(&self, record: &MessageRecord) -> Result<i64, CourierError> {
        self.insert(RecordKind::Response, record)
    }

    async fn get_request_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError> {
        self.get(RecordKind::Request, msg_id)
    }

    async fn get_response_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError> {
        self.get(RecordKind::Response, msg_id)
    }

    async fn update_request(&self, record: &MessageRecord) -> Result<(), CourierError> {
        self.update(RecordKind::Request, record)
    }

    async fn update_response(&self, record: &MessageRecord) -> Result<(), CourierError> {
        self.update(RecordKind::Response, record)
    }

    async fn delete_request(&self, id: i64) -> Result<(), CourierError> {
        self.delete(RecordKind::Request, id)
    }

    async fn delete_response(&self, id: i64) -> Result<(), CourierError> {
        self.delete(RecordKind::Response, id)
    }

    async fn delete_expired_or_succeeded(&self) -> Result<u64, CourierError> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        let mut purged = 0u64;
        for rows in tables.rows.values_mut() {
            let before = rows.len();
            rows.retain(|r| r.status != RecordStatus::Succeeded && !r.is_expired(now));
            purged += (before - rows.len()) as u64;
        }
        Ok(purged)
    }

    async fn find_retryable_requests(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError> {
        self.retryable(RecordKind::Request, max_retries)
    }

    async fn find_retryable_responses(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError> {
        self.retryable(RecordKind::Response, max_retries)
    }
}
