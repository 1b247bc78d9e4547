// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic redelivery of failed messages.
//!
//! Each cycle loads every Failed record still inside its retry budget from
//! both tables. Records whose recipient is online are persisted as Retrying
//! and then re-enqueued; the rest have their retry counter bumped.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{ClientId, Envelope, MessageRecord, RecordKind, RecordStatus, StorageAdapter};

use crate::delivery::enqueue_for_delivery;
use crate::registry::SessionRegistry;

/// Counts for one retry cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub examined: usize,
    pub redelivered: usize,
    pub still_offline: usize,
    pub busy: usize,
    pub unreadable: usize,
    pub storage_errors: usize,
}

enum Outcome {
    Redelivered,
    Offline,
    Busy,
    Unreadable,
    StorageError,
}

pub struct RetryEngine {
    registry: Arc<SessionRegistry>,
    storage: Arc<dyn StorageAdapter>,
    max_retries: u32,
    interval: Duration,
}

impl RetryEngine {
    pub fn new(
        registry: Arc<SessionRegistry>,
        storage: Arc<dyn StorageAdapter>,
        max_retries: u32,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            max_retries,
            interval,
        }
    }

    /// Runs cycles every `interval` until `cancel` fires. The first cycle
    /// runs one interval after start.
    pub async fn run(&self, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        info!(interval = ?self.interval, max_retries = self.max_retries, "retry engine started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    if report.examined > 0 {
                        info!(
                            examined = report.examined,
                            redelivered = report.redelivered,
                            still_offline = report.still_offline,
                            busy = report.busy,
                            unreadable = report.unreadable,
                            storage_errors = report.storage_errors,
                            "retry cycle complete"
                        );
                    }
                }
            }
        }
        info!("retry engine stopped");
    }

    /// One pass over both pending tables.
    pub async fn run_cycle(&self) -> RetryReport {
        let mut report = RetryReport::default();
        for kind in [RecordKind::Request, RecordKind::Response] {
            let records = match self
                .storage
                .find_retryable_by_kind(kind, self.max_retries)
                .await
            {
                Ok(records) => records,
                Err(e) => {
                    warn!(kind = %kind, error = %e, "failed to load retryable records");
                    report.storage_errors += 1;
                    continue;
                }
            };

            for record in records {
                report.examined += 1;
                match self.retry_one(kind, record).await {
                    Outcome::Redelivered => report.redelivered += 1,
                    Outcome::Offline => report.still_offline += 1,
                    Outcome::Busy => report.busy += 1,
                    Outcome::Unreadable => report.unreadable += 1,
                    Outcome::StorageError => report.storage_errors += 1,
                }
            }
        }
        report
    }

    async fn retry_one(&self, kind: RecordKind, mut record: MessageRecord) -> Outcome {
        record.retries += 1;

        let target = self.registry.get_by_identity(&ClientId(record.to.clone()));
        let Some(target) = target else {
            record.status = RecordStatus::Failed;
            return self.persist(kind, &record, Outcome::Offline, "offline").await;
        };

        let envelope = match Envelope::from_json(&record.content) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(msg_id = %record.msg_id, error = %e, "stored message no longer decodes");
                record.status = RecordStatus::Failed;
                return self
                    .persist(kind, &record, Outcome::Unreadable, "unreadable")
                    .await;
            }
        };

        // Persist before enqueue so a fast delivery outcome is never overwritten.
        record.status = RecordStatus::Retrying;
        if let Err(e) = self.storage.update_by_kind(kind, &record).await {
            warn!(msg_id = %record.msg_id, error = %e, "failed to persist retry");
            return Outcome::StorageError;
        }

        match enqueue_for_delivery(&target, envelope).await {
            Ok(()) => {
                debug!(msg_id = %record.msg_id, to = %record.to, retries = record.retries, "redelivering");
                #[cfg(feature = "prometheus")]
                courier_prometheus::record_retry("redelivered");
                Outcome::Redelivered
            }
            Err(_) => {
                record.status = RecordStatus::Failed;
                self.persist(kind, &record, Outcome::Busy, "busy").await
            }
        }
    }

    async fn persist(
        &self,
        kind: RecordKind,
        record: &MessageRecord,
        outcome: Outcome,
        label: &'static str,
    ) -> Outcome {
        if let Err(e) = self.storage.update_by_kind(kind, record).await {
            warn!(msg_id = %record.msg_id, error = %e, "failed to persist retry");
            return Outcome::StorageError;
        }
        debug!(msg_id = %record.msg_id, retries = record.retries, outcome = label, "retry deferred");
        #[cfg(feature = "prometheus")]
        courier_prometheus::record_retry(label);
        outcome
    }
}
