//! Configuration parsing, overrides, and validation.

use std::path::PathBuf;
use std::time::Duration;

use tgwatch::config::{load_config, Config, CHANNEL_ENV, GATEWAY_URL_ENV};

#[test]
fn empty_file_yields_defaults() {
    let config = Config::from_toml("").expect("empty config should parse");
    assert_eq!(config, Config::default());
    assert_eq!(config.poll_interval(), Duration::from_secs(10));
    assert_eq!(config.seen_retention(), Some(3600));
}

#[test]
fn partial_file_overrides_selected_fields() {
    let config = Config::from_toml(
        r#"
        channel = "rust_news"
        poll_interval_secs = 30
        session_path = "/var/lib/tgwatch/session.json"
        logs_dir = "/var/log/tgwatch"
        "#,
    )
    .expect("config should parse");

    assert_eq!(config.channel, "rust_news");
    assert_eq!(config.poll_interval_secs, 30);
    assert_eq!(
        config.session_path,
        PathBuf::from("/var/lib/tgwatch/session.json")
    );
    assert_eq!(config.logs_dir, Some(PathBuf::from("/var/log/tgwatch")));
    assert_eq!(config.poll_batch, 100);
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(Config::from_toml("poll_intervall_secs = 5").is_err());
}

#[test]
fn env_overrides_win_over_file() {
    let mut config = Config::from_toml(r#"channel = "from_file""#).expect("config should parse");

    config.apply_overrides(|key| match key {
        k if k == CHANNEL_ENV => Some("from_env".to_owned()),
        k if k == GATEWAY_URL_ENV => Some("http://gateway:9000".to_owned()),
        _ => None,
    });

    assert_eq!(config.channel, "from_env");
    assert_eq!(config.gateway_url, "http://gateway:9000");
}

#[test]
fn blank_env_override_is_ignored() {
    let mut config = Config::default();
    config.apply_overrides(|_| Some("   ".to_owned()));
    assert_eq!(config, Config::default());
}

#[test]
fn validate_rejects_zero_interval_and_batches() {
    let zero_interval = Config {
        poll_interval_secs: 0,
        ..Config::default()
    };
    assert!(zero_interval.validate().is_err());

    let zero_batch = Config {
        poll_batch: 0,
        ..Config::default()
    };
    assert!(zero_batch.validate().is_err());
}

#[test]
fn validate_rejects_bad_gateway_url_and_empty_channel() {
    let bad_url = Config {
        gateway_url: "not a url".to_owned(),
        ..Config::default()
    };
    assert!(bad_url.validate().is_err());

    let empty_channel = Config {
        channel: "@".to_owned(),
        ..Config::default()
    };
    assert!(empty_channel.validate().is_err());
}

#[test]
fn load_config_reports_missing_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = load_config(&dir.path().join("absent.toml")).expect_err("missing file must fail");
    assert!(err.to_string().contains("failed to read config"));
}
