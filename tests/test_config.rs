//! Tests for TOML configuration loading.

use distribution_records::config::{generation_fields, Config, DEFAULT_ENDPOINT};
use distribution_records::error::Error;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn empty_file_gives_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.client.endpoint_url, DEFAULT_ENDPOINT);
    assert_eq!(config.client.max_attempts, 3);
    assert_eq!(config.client.base_delay(), Duration::from_secs(1));
    assert_eq!(config.feedback.success_timeout_ms, 3000);
    assert_eq!(config.feedback.error_timeout_ms, 5000);
    assert_eq!(config.server.sheets.records, "records");
    assert_eq!(config.server.utc_offset_minutes, 540);
    assert!(!config.server.idempotent_retries);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let config = Config::from_toml(
        r#"
        [client]
        endpoint_url = "https://records.example/api/records"
        max_attempts = 5

        [server.sheets]
        activity = "audit"
        "#,
    )
    .unwrap();
    assert_eq!(config.client.endpoint_url, "https://records.example/api/records");
    assert_eq!(config.client.max_attempts, 5);
    assert_eq!(config.client.base_delay_ms, 1000);
    assert_eq!(config.server.sheets.activity, "audit");
    assert_eq!(config.server.sheets.analytics, "json_data");
}

#[test]
fn unknown_keys_are_rejected() {
    let err = Config::from_toml("[client]\nretries = 4\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(Config::from_toml("[extra]\n").is_err());
}

#[test]
fn load_reads_file_and_names_it_in_errors() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "[server]\nidempotent_retries = true\n").unwrap();
    assert!(Config::load(&good).unwrap().server.idempotent_retries);

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "[server]\nbind = 8080\n").unwrap();
    let err = Config::load(&bad).unwrap_err();
    assert!(err.to_string().contains("bad.toml"));

    let missing = dir.path().join("missing.toml");
    assert!(Config::load_or_default(Some(missing.as_path())).is_err());
}

#[test]
fn negative_timeout_is_clamped() {
    let config = Config::from_toml("[client]\ntimeout_seconds = -1.0\n").unwrap();
    assert_eq!(config.client.timeout(), Duration::ZERO);
}

#[test]
fn variant_fields_by_generation() {
    let table = generation_fields();
    assert_eq!(table[&8], &["gigantamax"]);
    assert_eq!(table[&9], &["terastallize"]);
    assert!(!table.contains_key(&7));
}
