// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens SQLite storage, builds the relay and its background engines, serves
//! the WebSocket gateway, and tears everything down in order on SIGTERM or
//! Ctrl+C.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_config::CourierConfig;
use courier_config::model::LoggingConfig;
use courier_core::{CourierError, Snowflake, StorageAdapter};
use courier_gateway::GatewayState;
use courier_relay::{Relay, shutdown};
use courier_storage::SqliteStorage;
use tracing::{error, info, warn};

/// Time allowed for background engines to finish their current cycle.
const ENGINE_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `courier serve` command until a shutdown signal arrives.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.logging)?;

    info!("starting courier serve");

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };

    let ids = match Snowflake::new(config.relay.node_id) {
        Ok(ids) => Arc::new(ids),
        Err(e) => {
            error!(node_id = config.relay.node_id, error = %e, "cannot create id generator");
            return Err(e);
        }
    };

    let relay = Relay::new(config.relay.clone(), storage.clone(), ids);
    let mut state = GatewayState::new(relay.clone(), &config.gateway);

    #[cfg(feature = "prometheus")]
    if config.prometheus.enabled {
        match courier_prometheus::PrometheusAdapter::new() {
            Ok(adapter) => {
                let render: Arc<dyn Fn() -> String + Send + Sync> =
                    Arc::new(move || adapter.render());
                state = state.with_prometheus(render);
            }
            Err(e) => warn!(error = %e, "prometheus exporter unavailable, continuing without it"),
        }
    }

    #[cfg(not(feature = "prometheus"))]
    if config.prometheus.enabled {
        info!("prometheus support not compiled in");
    }

    let cancel = shutdown::install_signal_handler();
    let engines = relay.spawn_background(&cancel);

    let listener = courier_gateway::bind(&config.gateway).await?;
    let gateway = tokio::spawn(courier_gateway::serve(listener, state, cancel.clone()));

    cancel.cancelled().await;
    info!("shutdown signal received, stopping relay");

    relay.shutdown();

    match gateway.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "gateway exited with error"),
        Err(e) => warn!(error = %e, "gateway task failed"),
    }

    for engine in engines {
        if tokio::time::timeout(ENGINE_STOP_TIMEOUT, engine).await.is_err() {
            warn!("background engine did not stop in time");
        }
    }

    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("courier serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber: console output, an optional
/// append-only log file, or both.
fn init_tracing(logging: &LoggingConfig) -> Result<(), CourierError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={},warn", logging.level)));

    let console = logging
        .console
        .then(|| fmt::layer().with_target(true).with_thread_names(false));
    let file = match &logging.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(Path::new(path))?)),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File, CourierError> {
    let open = || -> std::io::Result<File> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)
    };
    open().map_err(|e| {
        CourierError::Config(format!("cannot open log file {}: {e}", path.display()))
    })
}
