// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for health and metrics.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use courier_core::{HealthStatus, PluginAdapter};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Binary version.
    pub version: String,
    pub uptime_secs: u64,
    /// Registered sessions.
    pub live_sessions: usize,
    /// Storage health as reported by the adapter.
    pub storage: String,
}

/// GET /health
///
/// Returns 200 while storage is healthy and 503 otherwise.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let storage = match state.relay.storage().health_check().await {
        Ok(HealthStatus::Healthy) => Ok("healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => Ok(format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => Err(format!("unhealthy: {reason}")),
        Err(e) => Err(format!("unhealthy: {e}")),
    };
    let (code, status, storage) = match storage {
        Ok(storage) => (StatusCode::OK, "ok", storage),
        Err(storage) => (StatusCode::SERVICE_UNAVAILABLE, "degraded", storage),
    };

    let body = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        live_sessions: state.relay.registry().len(),
        storage,
    };
    (code, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text format, or 404 when the exporter is disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
