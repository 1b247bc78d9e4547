// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records outlive the process that wrote them.

use courier_config::model::StorageConfig;
use courier_core::{MessageRecord, PluginAdapter, RecordStatus, StorageAdapter};
use courier_storage::{Database, SqliteStorage};

fn config(path: &std::path::Path) -> StorageConfig {
    StorageConfig {
        database_path: path.to_str().unwrap().to_string(),
        wal_mode: true,
    }
}

#[tokio::test]
async fn failed_request_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart.db");

    {
        let storage = SqliteStorage::new(config(&path));
        storage.initialize().await.unwrap();
        let rec = MessageRecord::new(
            "msg-1",
            "r1",
            "alice",
            "bob",
            r#"{"msgid":"msg-1","req":{"reqid":"r1","from":"alice","to":"bob","content":"hi"}}"#,
            RecordStatus::Failed,
            chrono::Duration::minutes(600),
        );
        storage.insert_request(&rec).await.unwrap();
        storage.shutdown().await.unwrap();
    }

    let storage = SqliteStorage::new(config(&path));
    storage.initialize().await.unwrap();
    let pending = storage.find_retryable_requests(100).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].to, "bob");
    assert!(pending[0].content.contains("\"reqid\":\"r1\""));
}

#[tokio::test]
async fn reset_drops_all_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reset.db");
    let path_str = path.to_str().unwrap();

    {
        let storage = SqliteStorage::new(config(&path));
        storage.initialize().await.unwrap();
        let rec = MessageRecord::new(
            "msg-2",
            "r2",
            "alice",
            "bob",
            "{}",
            RecordStatus::Failed,
            chrono::Duration::minutes(600),
        );
        storage.insert_request(&rec).await.unwrap();
        storage.shutdown().await.unwrap();
    }

    Database::remove_files(path_str).await.unwrap();

    let storage = SqliteStorage::new(config(&path));
    storage.initialize().await.unwrap();
    assert!(storage.find_retryable_requests(100).await.unwrap().is_empty());
}
