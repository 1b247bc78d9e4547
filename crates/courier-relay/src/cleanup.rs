// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic purge of delivered and expired records.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use courier_core::{CourierError, StorageAdapter};

pub struct CleanupEngine {
    storage: Arc<dyn StorageAdapter>,
    interval: Duration,
}

impl CleanupEngine {
    pub fn new(storage: Arc<dyn StorageAdapter>, interval: Duration) -> Self {
        Self { storage, interval }
    }

    /// Runs cycles every `interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        info!(interval = ?self.interval, "cleanup engine started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "cleanup cycle failed");
                    }
                }
            }
        }
        info!("cleanup engine stopped");
    }

    /// Deletes every Succeeded record and every record past its expiry.
    /// Returns the number of rows removed.
    pub async fn run_cycle(&self) -> Result<u64, CourierError> {
        let purged = self.storage.delete_expired_or_succeeded().await?;
        if purged > 0 {
            info!(purged, "purged delivered and expired messages");
            #[cfg(feature = "prometheus")]
            courier_prometheus::record_purged(purged);
        } else {
            debug!("nothing to purge");
        }
        Ok(purged)
    }
}
