// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Dispatch, retry and cleanup tuning.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

impl CourierConfig {
    /// Render the effective configuration, e.g. for `courier config`.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Relay core tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Records with more retries than this are never picked up again.
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Seconds between retry cycles.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,

    /// Minutes between cleanup cycles.
    #[serde(default = "default_cleanup_interval_mins")]
    pub cleanup_interval_mins: u64,

    /// Lifetime of a persisted record.
    #[serde(default = "default_message_expire_mins")]
    pub message_expire_mins: u64,

    /// A session with no inbound traffic for this long is closed.
    #[serde(default = "default_idle_session_timeout_secs")]
    pub idle_session_timeout_secs: u64,

    /// Capacity of each session's outbound queue.
    #[serde(default = "default_max_outbound_queue_depth")]
    pub max_outbound_queue_depth: usize,

    /// How long an enqueue may wait for queue space before failing.
    #[serde(default = "default_enqueue_timeout_micros")]
    pub enqueue_timeout_micros: u64,

    /// Delay before a rejected duplicate connection is closed, so the client
    /// can read the rejection.
    #[serde(default = "default_duplicate_grace_ms")]
    pub duplicate_grace_ms: u64,

    /// Node id mixed into generated identifiers. Must differ between relays
    /// sharing a database.
    #[serde(default = "default_node_id")]
    pub node_id: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            retry_interval_secs: default_retry_interval_secs(),
            cleanup_interval_mins: default_cleanup_interval_mins(),
            message_expire_mins: default_message_expire_mins(),
            idle_session_timeout_secs: default_idle_session_timeout_secs(),
            max_outbound_queue_depth: default_max_outbound_queue_depth(),
            enqueue_timeout_micros: default_enqueue_timeout_micros(),
            duplicate_grace_ms: default_duplicate_grace_ms(),
            node_id: default_node_id(),
        }
    }
}

impl RelayConfig {
    /// Accessors clamp to the validation bounds, so an unvalidated config
    /// never yields a duration that overflows a timer.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs.min(MAX_RETRY_INTERVAL_SECS))
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_mins.min(MAX_CLEANUP_INTERVAL_MINS) * 60)
    }

    pub fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_expire_mins.min(MAX_MESSAGE_EXPIRE_MINS) * 60)
    }

    pub fn idle_session_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_session_timeout_secs)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_micros(self.enqueue_timeout_micros)
    }

    pub fn duplicate_grace(&self) -> Duration {
        Duration::from_millis(self.duplicate_grace_ms)
    }
}

/// Idle timeouts below this are rejected by validation.
pub const MIN_IDLE_SESSION_TIMEOUT_SECS: u64 = 30;

/// One day.
pub const MAX_RETRY_INTERVAL_SECS: u64 = 86_400;

/// One day.
pub const MAX_CLEANUP_INTERVAL_MINS: u64 = 1_440;

/// 36500 days.
pub const MAX_MESSAGE_EXPIRE_MINS: u64 = 36_500 * 1_440;

fn default_max_retry_count() -> u32 {
    100
}

fn default_retry_interval_secs() -> u64 {
    30
}

fn default_cleanup_interval_mins() -> u64 {
    15
}

fn default_message_expire_mins() -> u64 {
    600
}

fn default_idle_session_timeout_secs() -> u64 {
    55
}

fn default_max_outbound_queue_depth() -> usize {
    1024
}

fn default_enqueue_timeout_micros() -> u64 {
    50
}

fn default_duplicate_grace_ms() -> u64 {
    2000
}

fn default_node_id() -> u16 {
    1
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind the listener to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Largest accepted WebSocket message, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            max_message_size: default_max_message_size(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    7420
}

fn default_max_message_size() -> usize {
    20 * 1024 * 1024
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log lines to this file as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Write log lines to stderr.
    #[serde(default = "default_log_to_console")]
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
            console: default_log_to_console(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_console() -> bool {
    true
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the recorder and serve `/metrics`.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}
