// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::debug;

use courier_config::model::StorageConfig;
use courier_core::{
    AdapterType, CourierError, HealthStatus, MessageRecord, PluginAdapter, RecordKind,
    StorageAdapter,
};

use crate::database::Database;
use crate::queries::records;

/// SQLite-backed storage adapter.
///
/// The database is lazily opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, CourierError> {
        self.db.get().ok_or_else(|| CourierError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint(&self) -> Result<(), CourierError> {
        if !self.config.wal_mode {
            return Ok(());
        }
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        if self.db.get().is_some() {
            self.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), CourierError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| CourierError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.checkpoint().await
    }

    async fn insert_request(&self, record: &MessageRecord) -> Result<i64, CourierError> {
        records::insert(self.db()?, RecordKind::Request, record).await
    }

    async fn insert_response(&self, record: &MessageRecord) -> Result<i64, CourierError> {
        records::insert(self.db()?, RecordKind::Response, record).await
    }

    async fn get_request_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError> {
        records::get_by_msg_id(self.db()?, RecordKind::Request, msg_id).await
    }

    async fn get_response_by_msg_id(&self, msg_id: &str) -> Result<MessageRecord, CourierError> {
        records::get_by_msg_id(self.db()?, RecordKind::Response, msg_id).await
    }

    async fn update_request(&self, record: &MessageRecord) -> Result<(), CourierError> {
        records::update(self.db()?, RecordKind::Request, record).await
    }

    async fn update_response(&self, record: &MessageRecord) -> Result<(), CourierError> {
        records::update(self.db()?, RecordKind::Response, record).await
    }

    async fn delete_request(&self, id: i64) -> Result<(), CourierError> {
        records::delete(self.db()?, RecordKind::Request, id).await
    }

    async fn delete_response(&self, id: i64) -> Result<(), CourierError> {
        records::delete(self.db()?, RecordKind::Response, id).await
    }

    async fn delete_expired_or_succeeded(&self) -> Result<u64, CourierError> {
        records::delete_expired_or_succeeded(self.db()?, Utc::now()).await
    }

    async fn find_retryable_requests(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError> {
        records::find_retryable(self.db()?, RecordKind::Request, max_retries).await
    }

    async fn find_retryable_responses(
        &self,
        max_retries: u32,
    ) -> Result<Vec<MessageRecord>, CourierError> {
        records::find_retryable(self.db()?, RecordKind::Response, max_retries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::RecordStatus;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let storage = SqliteStorage::new(make_config("unused.db"));
        assert!(storage.find_retryable_requests(1).await.is_err());
        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test]
    async fn double_initialize_is_rejected() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn request_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);

        let mut rec = MessageRecord::new(
            "msg-100",
            "r1",
            "alice",
            "bob",
            "{}",
            RecordStatus::Failed,
            chrono::Duration::minutes(600),
        );
        rec.id = storage.insert_request(&rec).await.unwrap();

        let retryable = storage.find_retryable_requests(100).await.unwrap();
        assert_eq!(retryable.len(), 1);
        assert!(storage.find_retryable_responses(100).await.unwrap().is_empty());

        rec.status = RecordStatus::Retrying;
        rec.retries = 1;
        storage.update_request(&rec).await.unwrap();
        let got = storage.get_request_by_msg_id("msg-100").await.unwrap();
        assert_eq!(got.status, RecordStatus::Retrying);
        assert_eq!(got.retries, 1);

        rec.status = RecordStatus::Succeeded;
        storage.update_by_kind(RecordKind::Request, &rec).await.unwrap();
        assert_eq!(storage.delete_expired_or_succeeded().await.unwrap(), 1);
        assert!(storage.get_request_by_msg_id("msg-100").await.is_err());

        storage.close().await.unwrap();
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn delete_by_id_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("delete.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let rec = MessageRecord::new(
            "msg-200",
            "p1",
            "bob",
            "alice",
            "{}",
            RecordStatus::Queued,
            chrono::Duration::minutes(1),
        );
        let id = storage.insert_response(&rec).await.unwrap();
        storage.delete_response(id).await.unwrap();
        storage.delete_response(id).await.unwrap();
        assert!(storage.get_response_by_msg_id("msg-200").await.is_err());
    }
}
