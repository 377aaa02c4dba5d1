//! Durable message log.
//!
//! Every accepted message is appended to an ordered stream. Delivery workers
//! read it through a named consumer group, so each entry is handed to one
//! consumer of the group and stays pending until acknowledged.

use std::time::Duration;

use async_trait::async_trait;

pub mod entry;
pub mod error;
pub mod memory;
pub mod producer;
pub mod redis_log;

pub use entry::{LogEntry, RawEntry};
pub use error::{LogError, LogResult};
pub use memory::MemoryLog;
pub use producer::StreamProducer;
pub use redis_log::RedisLog;

#[async_trait]
pub trait MessageLog: Send + Sync {
    /// Append an entry and return the id the log assigned to it.
    async fn append(&self, entry: &LogEntry) -> LogResult<String>;

    /// Create the consumer group reading from the start of the log. Idempotent.
    async fn ensure_group(&self, group: &str) -> LogResult<()>;

    /// Read up to `count` entries never delivered to the group, waiting at
    /// most `block` for new ones. An empty result means the wait timed out.
    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> LogResult<Vec<RawEntry>>;

    async fn ack(&self, group: &str, entry_id: &str) -> LogResult<()>;

    async fn ping(&self) -> LogResult<()>;

    fn backend(&self) -> &'static str;
}
