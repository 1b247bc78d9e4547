// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-zero intervals, non-empty paths, and a parseable bind host.

use crate::diagnostic::ConfigError;
use crate::model::{
    CourierConfig, MAX_CLEANUP_INTERVAL_MINS, MAX_MESSAGE_EXPIRE_MINS, MAX_RETRY_INTERVAL_SECS,
    MIN_IDLE_SESSION_TIMEOUT_SECS,
};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let relay = &config.relay;

    for (name, value) in [
        ("relay.retry_interval_secs", relay.retry_interval_secs),
        ("relay.cleanup_interval_mins", relay.cleanup_interval_mins),
        ("relay.message_expire_mins", relay.message_expire_mins),
        ("relay.enqueue_timeout_micros", relay.enqueue_timeout_micros),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{name} must be greater than 0")));
        }
    }

    for (name, value, max) in [
        (
            "relay.retry_interval_secs",
            relay.retry_interval_secs,
            MAX_RETRY_INTERVAL_SECS,
        ),
        (
            "relay.cleanup_interval_mins",
            relay.cleanup_interval_mins,
            MAX_CLEANUP_INTERVAL_MINS,
        ),
        (
            "relay.message_expire_mins",
            relay.message_expire_mins,
            MAX_MESSAGE_EXPIRE_MINS,
        ),
    ] {
        if value > max {
            errors.push(ConfigError::validation(format!(
                "{name} must be at most {max}, got {value}"
            )));
        }
    }

    if relay.max_outbound_queue_depth == 0 {
        errors.push(ConfigError::validation(
            "relay.max_outbound_queue_depth must be greater than 0",
        ));
    }

    if relay.idle_session_timeout_secs < MIN_IDLE_SESSION_TIMEOUT_SECS {
        errors.push(ConfigError::validation(format!(
            "relay.idle_session_timeout_secs must be at least {MIN_IDLE_SESSION_TIMEOUT_SECS}, got {}",
            relay.idle_session_timeout_secs
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.gateway.max_message_size == 0 {
        errors.push(ConfigError::validation(
            "gateway.max_message_size must be greater than 0",
        ));
    }

    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    let logging = &config.logging;
    if logging.file.as_deref().is_some_and(|f| f.trim().is_empty()) {
        errors.push(ConfigError::validation("logging.file must not be empty"));
    } else if !logging.console && logging.file.is_none() {
        errors.push(ConfigError::validation(
            "logging.console is false and no logging.file is set; logs would go nowhere",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
