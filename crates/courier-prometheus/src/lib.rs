// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for the Courier relay.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via [`PrometheusAdapter::render`],
//! which the gateway exposes at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use courier_core::{AdapterType, CourierError, HealthStatus, PluginAdapter};

pub use recording::{
    record_delivery, record_enqueue_timeout, record_envelope, record_forwarded, record_purged,
    record_retry, set_live_sessions,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder and exposes a handle for rendering.
#[derive(Clone)]
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally. Only one recorder can be
    /// installed per process.
    pub fn new() -> Result<Self, CourierError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            CourierError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wraps an existing handle without touching the global recorder.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, CourierError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CourierError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_record_into_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());

        metrics::with_local_recorder(&recorder, || {
            set_live_sessions(3);
            record_envelope("request");
            record_envelope("request");
            record_enqueue_timeout();
            record_purged(5);
        });

        let text = adapter.render();
        assert!(text.contains("courier_live_sessions 3"));
        assert!(text.contains(r#"courier_envelopes_total{kind="request"} 2"#));
        assert!(text.contains("courier_enqueue_timeouts_total 1"));
        assert!(text.contains("courier_purged_records_total 5"));
    }

    #[tokio::test]
    async fn adapter_identity() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let adapter = PrometheusAdapter::from_handle(recorder.handle());
        assert_eq!(adapter.name(), "prometheus");
        assert_eq!(adapter.adapter_type(), AdapterType::Observability);
        assert_eq!(adapter.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
