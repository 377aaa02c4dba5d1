//! Test plan for the `relayhub-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use relayhub_config::{load, AppConfig, HttpConfig, RelayConfig, StreamConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "RELAYHUB_CONFIG",
    "RELAYHUB__DATABASE__MAX_CONNECTIONS",
    "RELAYHUB__DATABASE__URL",
    "RELAYHUB__HTTP__ADDRESS",
    "RELAYHUB__HTTP__PORT",
    "RELAYHUB__STREAM__REDIS_URL",
    "RELAYHUB__STREAM__STREAM_KEY",
    "RELAYHUB__STREAM__CONSUMER_GROUP",
    "RELAYHUB__STREAM__CONSUMER_NAME",
    "RELAYHUB__STREAM__BLOCK_MS",
    "RELAYHUB__STREAM__BATCH_SIZE",
    "RELAYHUB__STREAM__RETRY_BACKOFF_MS",
    "RELAYHUB__STREAM__FALLBACK_TO_MEMORY",
    "RELAYHUB__RELAY__OUTBOUND_BUFFER",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(config.stream.stream_key, defaults.stream.stream_key);
    assert_eq!(config.stream.consumer_group, defaults.stream.consumer_group);
    assert_eq!(config.stream.block_ms, defaults.stream.block_ms);
    assert_eq!(config.stream.batch_size, defaults.stream.batch_size);
    assert!(config.stream.consumer_name.is_none());
    assert_eq!(config.relay.outbound_buffer, defaults.relay.outbound_buffer);
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "relayhub.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/relayhub.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "relayhub.toml",
        r#"
        [http]
        port = 8181

        [stream]
        stream_key = "acme:messages"
        batch_size = 25
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.http.port, 8181);
    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.stream.stream_key, "acme:messages");
    assert_eq!(config.stream.batch_size, 25);
    assert_eq!(config.stream.consumer_group, defaults.stream.consumer_group);
    assert_eq!(config.database.url, defaults.database.url);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [stream]
        consumer_name = "worker-a"
        fallback_to_memory = true
        "#,
    );
    ctx.set_var(
        "RELAYHUB_CONFIG",
        temp_dir.path().join("elsewhere/custom.toml").to_string_lossy(),
    );

    let config = load().expect("configuration load should use RELAYHUB_CONFIG");
    assert_eq!(config.stream.consumer_name.as_deref(), Some("worker-a"));
    assert!(config.stream.fallback_to_memory);
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "relayhub.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("RELAYHUB__HTTP__PORT", "8080");
    ctx.set_var("RELAYHUB__STREAM__REDIS_URL", "redis://cache:6380");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.stream.redis_url, "redis://cache:6380");
}

#[test]
#[serial]
fn load_raises_zero_sizes_to_one() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "relayhub.toml",
        r#"
        [stream]
        batch_size = 0

        [relay]
        outbound_buffer = 0
        "#,
    );

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.stream.batch_size, 1);
    assert_eq!(config.relay.outbound_buffer, 1);
}

#[test]
#[serial]
fn load_raises_zero_block_interval_from_environment() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("RELAYHUB__STREAM__BLOCK_MS", "0");

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.stream.block_ms, 1);
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "relayhub.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn stream_config_resolves_consumer_name_from_pid() {
    let mut stream = StreamConfig::default();
    assert_eq!(
        stream.resolved_consumer_name(),
        format!("consumer-{}", std::process::id())
    );

    stream.consumer_name = Some("   ".to_string());
    assert!(stream.resolved_consumer_name().starts_with("consumer-"));

    stream.consumer_name = Some("edge-1".to_string());
    assert_eq!(stream.resolved_consumer_name(), "edge-1");
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 8000);
}

#[test]
fn relay_config_defaults_to_bounded_outbound_buffer() {
    assert_eq!(RelayConfig::default().outbound_buffer, 256);
}
