// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for loading, layering and diagnosing configuration.

use courier_config::diagnostic::ConfigError;
use courier_config::model::CourierConfig;
use courier_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[relay]
max_retry_count = 5
retry_interval_secs = 10
cleanup_interval_mins = 1
message_expire_mins = 60
idle_session_timeout_secs = 45
max_outbound_queue_depth = 16
enqueue_timeout_micros = 200
duplicate_grace_ms = 100
node_id = 7

[storage]
database_path = "/var/lib/courier/courier.db"
wal_mode = false

[gateway]
host = "0.0.0.0"
port = 9000
max_message_size = 1024

[logging]
level = "debug"
file = "/var/log/courier/courier.log"
console = false

[prometheus]
enabled = false
"#;
    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.relay.max_retry_count, 5);
    assert_eq!(config.relay.node_id, 7);
    assert_eq!(config.storage.database_path, "/var/lib/courier/courier.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(
        config.logging.file.as_deref(),
        Some("/var/log/courier/courier.log")
    );
    assert!(!config.logging.console);
    assert!(!config.prometheus.enabled);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.relay.max_retry_count, 100);
    assert_eq!(config.relay.message_expire_mins, 600);
    assert_eq!(config.gateway.port, 7420);
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert!(config.logging.console);
    assert!(config.storage.database_path.ends_with("courier.db"));
}

/// Env vars arrive as dotted keys after mapping; simulate with a tuple provider.
#[test]
fn dotted_override_beats_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string("[relay]\nmax_retry_count = 5\n"))
        .merge((
            courier_config::loader::map_env_key("relay_max_retry_count"),
            9,
        ))
        .extract()
        .expect("should merge override");

    assert_eq!(config.relay.max_retry_count, 9);
}

#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/nonexistent/path/courier.toml"))
        .extract()
        .expect("missing file should be silently skipped");
    assert_eq!(config.relay.retry_interval_secs, 30);
}

#[test]
fn explicit_file_is_layered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("explicit.toml");
    std::fs::write(&path, "[gateway]\nport = 8123\n").unwrap();

    let config = courier_config::load_config_from_path(&path).unwrap();
    assert_eq!(config.gateway.port, 8123);
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[relay]
max_retry_cont = 3
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "max_retry_cont"
                && suggestion.as_deref() == Some("max_retry_count")
                && valid_keys.contains("node_id")
        })
    });
    assert!(found, "expected UnknownKey with suggestion, got: {errors:?}");
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let errors = load_and_validate_str("[agent]\nname = \"x\"\n").expect_err("unknown section");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::UnknownKey { key, .. } if key == "agent")));
}

#[test]
fn invalid_type_is_reported_with_path() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").expect_err("bad type");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "gateway.port")));
}

#[test]
fn validation_errors_surface_through_loader() {
    let errors =
        load_and_validate_str("[relay]\nidle_session_timeout_secs = 5\n").expect_err("too short");
    assert!(matches!(&errors[0], ConfigError::Validation { message } if message.contains("idle")));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let errors = load_and_validate_str("[relay]\nnod_id = 3\n").unwrap_err();
    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &errors[0] as &dyn miette::Diagnostic)
        .unwrap();
    assert!(buf.contains("nod_id"));
    assert!(buf.contains("courier::config::unknown_key"));
}

#[test]
fn effective_config_serializes_to_toml() {
    let config = CourierConfig::default();
    let rendered = config.to_toml().unwrap();
    let parsed: CourierConfig = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.relay.max_retry_count, config.relay.max_retry_count);
    assert!(serde_json::to_value(&parsed).unwrap()["relay"].is_object());
}
