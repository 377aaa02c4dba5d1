use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::entry::{LogEntry, RawEntry};
use crate::error::{LogError, LogResult};
use crate::MessageLog;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis Streams backed log.
///
/// Blocking `XREADGROUP` calls hold their connection for the whole wait, so
/// reads go through a dedicated connection and appends never queue behind them.
#[derive(Clone)]
pub struct RedisLog {
    stream_key: String,
    writer: ConnectionManager,
    reader: ConnectionManager,
}

impl RedisLog {
    pub async fn connect(redis_url: &str, stream_key: impl Into<String>) -> LogResult<Self> {
        let client = Client::open(redis_url)?;
        let writer = connect_manager(client.clone()).await?;
        let reader = connect_manager(client).await?;

        let log = Self {
            stream_key: stream_key.into(),
            writer,
            reader,
        };
        log.ping().await?;

        info!(stream = %log.stream_key, "redis log connected");
        Ok(log)
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }
}

async fn connect_manager(client: Client) -> LogResult<ConnectionManager> {
    tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| {
            LogError::Unavailable(format!(
                "connection timed out after {}s",
                CONNECT_TIMEOUT.as_secs()
            ))
        })?
        .map_err(LogError::from)
}

/// Field values that are not text are left out, so that entry alone fails to decode.
fn text_fields(entry_id: &str, map: &HashMap<String, redis::Value>) -> HashMap<String, String> {
    let mut fields = HashMap::with_capacity(map.len());
    for (name, value) in map {
        match redis::from_redis_value::<String>(value) {
            Ok(text) => {
                fields.insert(name.clone(), text);
            }
            Err(error) => {
                warn!(entry_id, field = %name, %error, "dropping non-text field value");
            }
        }
    }
    fields
}

#[async_trait]
impl MessageLog for RedisLog {
    async fn append(&self, entry: &LogEntry) -> LogResult<String> {
        let mut conn = self.writer.clone();
        let id: String = conn
            .xadd(&self.stream_key, "*", &entry.to_fields())
            .await?;
        debug!(entry_id = %id, message_id = %entry.message_id, "appended log entry");
        Ok(id)
    }

    async fn ensure_group(&self, group: &str) -> LogResult<()> {
        let mut conn = self.writer.clone();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.stream_key, group, "0")
            .await;

        match created {
            Ok(()) => {
                info!(stream = %self.stream_key, group, "created consumer group");
                Ok(())
            }
            Err(err) if err.code() == Some("BUSYGROUP") => {
                debug!(stream = %self.stream_key, group, "consumer group already exists");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> LogResult<Vec<RawEntry>> {
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .block(block.as_millis() as usize)
            .count(count);

        let mut conn = self.reader.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[self.stream_key.as_str()], &[">"], &options)
            .await?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for key in reply.keys {
            for stream_id in key.ids {
                let fields = text_fields(&stream_id.id, &stream_id.map);
                entries.push(RawEntry {
                    id: stream_id.id,
                    fields,
                });
            }
        }
        Ok(entries)
    }

    async fn ack(&self, group: &str, entry_id: &str) -> LogResult<()> {
        let mut conn = self.writer.clone();
        let _: i64 = conn.xack(&self.stream_key, group, &[entry_id]).await?;
        Ok(())
    }

    async fn ping(&self) -> LogResult<()> {
        let mut conn = self.writer.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
