// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use courier_config::model::GatewayConfig;
use courier_core::CourierError;
use courier_relay::Relay;

use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The relay every WebSocket connection is handed to.
    pub relay: Relay,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl GatewayState {
    pub fn new(relay: Relay, config: &GatewayConfig) -> Self {
        Self {
            relay,
            start_time: std::time::Instant::now(),
            prometheus_render: None,
            max_message_size: config.max_message_size,
        }
    }

    pub fn with_prometheus(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.prometheus_render = Some(render);
        self
    }
}

/// Builds the gateway routes:
/// - GET /ws (WebSocket upgrade, one relay session per socket)
/// - GET /health
/// - GET /metrics
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured host and port.
pub async fn bind(config: &GatewayConfig) -> Result<TcpListener, CourierError> {
    let addr = format!("{}:{}", config.host, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serves the gateway on `listener` until `shutdown` fires.
///
/// Upgraded WebSocket connections are owned by the relay and are not waited
/// for here; [`Relay::shutdown`] ends them.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Gateway server listening on {addr}");
    }

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| CourierError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway server stopped");
    Ok(())
}
