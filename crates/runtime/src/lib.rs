use std::sync::Arc;

use anyhow::{Context, Result};
use relayhub_config::AppConfig;
use relayhub_database::initialize_database;
use relayhub_stream::{MemoryLog, MessageLog, RedisLog};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Long-lived backends shared by the gateway and the delivery worker.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub log: Arc<dyn MessageLog>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise record store")?;

        let log = open_log(config).await?;
        info!(backend = log.backend(), "message log ready");

        Ok(Self { db_pool, log })
    }
}

async fn open_log(config: &AppConfig) -> Result<Arc<dyn MessageLog>> {
    let stream = &config.stream;
    match RedisLog::connect(&stream.redis_url, stream.stream_key.clone()).await {
        Ok(log) => {
            info!(stream_key = %stream.stream_key, "redis stream connection established");
            Ok(Arc::new(log))
        }
        Err(error) if stream.fallback_to_memory => {
            warn!(
                %error,
                "redis unavailable, falling back to in-process message log; entries will not survive a restart"
            );
            Ok(Arc::new(MemoryLog::new()))
        }
        Err(error) => Err(error)
            .with_context(|| format!("failed to connect to message log at {}", stream.redis_url)),
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
