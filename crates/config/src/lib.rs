use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "relayhub.toml",
    "config/relayhub.toml",
    "crates/config/relayhub.toml",
    "../relayhub.toml",
    "../config/relayhub.toml",
    "../crates/config/relayhub.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://relayhub.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Settings for the durable message log and its consumer group.
///
/// ```
/// use relayhub_config::StreamConfig;
///
/// let stream = StreamConfig::default();
/// assert_eq!(stream.stream_key, "relayhub:messages");
/// assert_eq!(stream.consumer_group, "relayhub-consumers");
/// assert_eq!(stream.block_ms, 5_000);
/// assert_eq!(stream.batch_size, 10);
/// assert!(!stream.fallback_to_memory);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "StreamConfig::default_redis_url")]
    pub redis_url: String,
    #[serde(default = "StreamConfig::default_stream_key")]
    pub stream_key: String,
    #[serde(default = "StreamConfig::default_consumer_group")]
    pub consumer_group: String,
    /// Unique per running instance. Derived from the process id when unset.
    #[serde(default)]
    pub consumer_name: Option<String>,
    #[serde(default = "StreamConfig::default_block_ms")]
    pub block_ms: u64,
    #[serde(default = "StreamConfig::default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "StreamConfig::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Run on an in-process log when Redis is unreachable at startup. Entries are
    /// kept until every consumer group has acknowledged them.
    #[serde(default)]
    pub fallback_to_memory: bool,
}

impl StreamConfig {
    fn default_redis_url() -> String {
        "redis://127.0.0.1:6379".to_string()
    }

    fn default_stream_key() -> String {
        "relayhub:messages".to_string()
    }

    fn default_consumer_group() -> String {
        "relayhub-consumers".to_string()
    }

    const fn default_block_ms() -> u64 {
        5_000
    }

    const fn default_batch_size() -> usize {
        10
    }

    const fn default_retry_backoff_ms() -> u64 {
        1_000
    }

    /// The configured consumer name, or `consumer-<pid>`.
    pub fn resolved_consumer_name(&self) -> String {
        self.consumer_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("consumer-{}", std::process::id()))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            redis_url: Self::default_redis_url(),
            stream_key: Self::default_stream_key(),
            consumer_group: Self::default_consumer_group(),
            consumer_name: None,
            block_ms: Self::default_block_ms(),
            batch_size: Self::default_batch_size(),
            retry_backoff_ms: Self::default_retry_backoff_ms(),
            fallback_to_memory: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Frames buffered per connection before fast-path writes report the peer unreachable.
    #[serde(default = "RelayConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl RelayConfig {
    const fn default_outbound_buffer() -> usize {
        256
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use relayhub_config::load;
///
/// std::env::remove_var("RELAYHUB_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let to_i64 = |value: u64| i64::try_from(value).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("stream.redis_url", defaults.stream.redis_url.clone())?
        .set_default("stream.stream_key", defaults.stream.stream_key.clone())?
        .set_default(
            "stream.consumer_group",
            defaults.stream.consumer_group.clone(),
        )?
        .set_default("stream.block_ms", to_i64(defaults.stream.block_ms))?
        .set_default(
            "stream.batch_size",
            to_i64(defaults.stream.batch_size as u64),
        )?
        .set_default(
            "stream.retry_backoff_ms",
            to_i64(defaults.stream.retry_backoff_ms),
        )?
        .set_default("stream.fallback_to_memory", defaults.stream.fallback_to_memory)?
        .set_default(
            "relay.outbound_buffer",
            to_i64(defaults.relay.outbound_buffer as u64),
        )?;

    let environment_overrides = config::Environment::with_prefix("RELAYHUB").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("RELAYHUB_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via RELAYHUB_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.stream.batch_size == 0 {
        config.stream.batch_size = 1;
    }
    // BLOCK 0 means wait forever on Redis.
    if config.stream.block_ms == 0 {
        config.stream.block_ms = 1;
    }
    if config.relay.outbound_buffer == 0 {
        config.relay.outbound_buffer = 1;
    }

    debug!(?config, "loaded relay configuration");
    Ok(config)
}
