// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRUD and bulk operations on the pending request/response tables.
//!
//! Both tables share one column layout, so every query is written once and
//! parameterized by [`RecordKind`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use courier_core::{CourierError, MessageRecord, RecordKind, RecordStatus};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use crate::database::{Database, TIMESTAMP_FORMAT};

const COLUMNS: &str = "id, version, msg_id, correlation_id, sender, recipient, content, \
                       created_at, expires_at, retries, status";

/// Table backing a record kind. Only these two names ever reach SQL text.
pub fn table_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Request => "pending_requests",
        RecordKind::Response => "pending_responses",
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let retries: i64 = row.get(9)?;
    let status: String = row.get(10)?;
    Ok(MessageRecord {
        id: row.get(0)?,
        version: row.get(1)?,
        msg_id: row.get(2)?,
        correlation_id: row.get(3)?,
        from: row.get(4)?,
        to: row.get(5)?,
        content: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        expires_at: parse_timestamp(row, 8)?,
        retries: u32::try_from(retries).map_err(|e| conversion_err(9, e))?,
        status: RecordStatus::from_str(&status).map_err(|e| conversion_err(10, e))?,
    })
}

/// Insert a record. Returns the new surrogate id.
pub async fn insert(
    db: &Database,
    kind: RecordKind,
    record: &MessageRecord,
) -> Result<i64, CourierError> {
    let sql = format!(
        "INSERT INTO {} (version, msg_id, correlation_id, sender, recipient, content, \
         created_at, expires_at, retries, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        table_name(kind)
    );
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &sql,
                params![
                    record.version,
                    record.msg_id,
                    record.correlation_id,
                    record.from,
                    record.to,
                    record.content,
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.expires_at),
                    i64::from(record.retries),
                    record.status.to_string(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch by forwarded message id.
pub async fn get_by_msg_id(
    db: &Database,
    kind: RecordKind,
    msg_id: &str,
) -> Result<MessageRecord, CourierError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM {} WHERE msg_id = ?1",
        table_name(kind)
    );
    let key = msg_id.to_string();
    let found = db
        .connection()
        .call(move |conn| {
            conn.query_row(&sql, params![key], record_from_row)
                .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    found.ok_or_else(|| CourierError::NotFound {
        msg_id: msg_id.to_string(),
    })
}

/// Rewrite the mutable columns of the record with `record.id`.
pub async fn update(
    db: &Database,
    kind: RecordKind,
    record: &MessageRecord,
) -> Result<(), CourierError> {
    let sql = format!(
        "UPDATE {} SET version = ?1, content = ?2, expires_at = ?3, retries = ?4, status = ?5 \
         WHERE id = ?6",
        table_name(kind)
    );
    let record = record.clone();
    let msg_id = record.msg_id.clone();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &sql,
                params![
                    record.version,
                    record.content,
                    format_timestamp(&record.expires_at),
                    i64::from(record.retries),
                    record.status.to_string(),
                    record.id,
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    if changed == 0 {
        return Err(CourierError::NotFound { msg_id });
    }
    Ok(())
}

/// Delete by surrogate id. Deleting a missing row is not an error.
pub async fn delete(db: &Database, kind: RecordKind, id: i64) -> Result<(), CourierError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", table_name(kind));
    db.connection()
        .call(move |conn| {
            conn.execute(&sql, params![id])?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Failed records with `retries <= max_retries`, oldest first.
pub async fn find_retryable(
    db: &Database,
    kind: RecordKind,
    max_retries: u32,
) -> Result<Vec<MessageRecord>, CourierError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM {} WHERE status = ?1 AND retries <= ?2 ORDER BY id ASC",
        table_name(kind)
    );
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![RecordStatus::Failed.to_string(), i64::from(max_retries)],
                    record_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Purge Succeeded and expired rows from both tables in one transaction.
pub async fn delete_expired_or_succeeded(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<u64, CourierError> {
    let now = format_timestamp(&now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut purged = 0usize;
            for kind in [RecordKind::Request, RecordKind::Response] {
                purged += tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE status = ?1 OR expires_at < ?2",
                        table_name(kind)
                    ),
                    params![RecordStatus::Succeeded.to_string(), now],
                )?;
            }
            tx.commit()?;
            Ok(purged as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("records.db");
        Database::open(path.to_str().unwrap(), true).await.unwrap()
    }

    fn record(msg_id: &str, status: RecordStatus) -> MessageRecord {
        MessageRecord::new(
            msg_id,
            "r1",
            "alice",
            "bob",
            r#"{"msgid":"x"}"#,
            status,
            chrono::Duration::minutes(10),
        )
    }

    #[tokio::test]
    async fn insert_then_get_preserves_fields() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;

        let rec = record("msg-1", RecordStatus::Queued);
        let id = insert(&db, RecordKind::Request, &rec).await.unwrap();
        assert!(id > 0);

        let got = get_by_msg_id(&db, RecordKind::Request, "msg-1").await.unwrap();
        assert_eq!(got.id, id);
        assert_eq!(got.correlation_id, "r1");
        assert_eq!(got.from, "alice");
        assert_eq!(got.to, "bob");
        assert_eq!(got.status, RecordStatus::Queued);
        assert_eq!(
            format_timestamp(&got.expires_at),
            format_timestamp(&rec.expires_at)
        );
    }

    #[tokio::test]
    async fn tables_are_separate() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;

        insert(&db, RecordKind::Response, &record("msg-2", RecordStatus::Failed))
            .await
            .unwrap();
        let err = get_by_msg_id(&db, RecordKind::Request, "msg-2")
            .await
            .unwrap_err();
        assert!(matches!(err, CourierError::NotFound { msg_id } if msg_id == "msg-2"));
    }

    #[tokio::test]
    async fn duplicate_msg_id_is_rejected() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;
        let rec = record("msg-dup", RecordStatus::Queued);
        insert(&db, RecordKind::Request, &rec).await.unwrap();
        assert!(insert(&db, RecordKind::Request, &rec).await.is_err());
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;
        let mut rec = record("msg-ghost", RecordStatus::Failed);
        rec.id = 999;
        let err = update(&db, RecordKind::Request, &rec).await.unwrap_err();
        assert!(matches!(err, CourierError::NotFound { .. }));
    }

    #[tokio::test]
    async fn retryable_respects_status_and_budget() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;

        let mut within = record("msg-a", RecordStatus::Failed);
        within.retries = 3;
        let mut at_limit = record("msg-b", RecordStatus::Failed);
        at_limit.retries = 5;
        let mut over = record("msg-c", RecordStatus::Failed);
        over.retries = 6;
        let queued = record("msg-d", RecordStatus::Queued);

        for rec in [&within, &at_limit, &over, &queued] {
            insert(&db, RecordKind::Request, rec).await.unwrap();
        }

        let found = find_retryable(&db, RecordKind::Request, 5).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.msg_id.as_str()).collect();
        assert_eq!(ids, vec!["msg-a", "msg-b"]);
    }

    #[tokio::test]
    async fn purge_removes_succeeded_and_expired_only() {
        let dir = tempdir().unwrap();
        let db = open(&dir).await;

        let live = record("msg-live", RecordStatus::Failed);
        let done = record("msg-done", RecordStatus::Succeeded);
        let mut stale = record("msg-stale", RecordStatus::Queued);
        stale.expires_at = Utc::now() - chrono::Duration::minutes(1);

        insert(&db, RecordKind::Request, &live).await.unwrap();
        insert(&db, RecordKind::Request, &done).await.unwrap();
        insert(&db, RecordKind::Response, &stale).await.unwrap();

        let purged = delete_expired_or_succeeded(&db, Utc::now()).await.unwrap();
        assert_eq!(purged, 2);
        assert!(get_by_msg_id(&db, RecordKind::Request, "msg-live").await.is_ok());
        assert!(get_by_msg_id(&db, RecordKind::Request, "msg-done").await.is_err());
        assert!(get_by_msg_id(&db, RecordKind::Response, "msg-stale").await.is_err());
    }
}
