use std::sync::Arc;

use relayhub_database::Message;
use tracing::{debug, warn};

use crate::entry::LogEntry;
use crate::error::LogResult;
use crate::MessageLog;

/// Appends persisted messages to the log.
///
/// A failed append is reported once and not retried; the stored record stays
/// authoritative for the message.
#[derive(Clone)]
pub struct StreamProducer {
    log: Arc<dyn MessageLog>,
}

impl StreamProducer {
    pub fn new(log: Arc<dyn MessageLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<dyn MessageLog> {
        &self.log
    }

    pub async fn publish(&self, message: &Message) -> LogResult<String> {
        let result = match LogEntry::from_message(message) {
            Ok(entry) => self.log.append(&entry).await,
            Err(error) => Err(error),
        };

        match &result {
            Ok(entry_id) => debug!(message_id = %message.id, %entry_id, "published message"),
            Err(error) => warn!(message_id = %message.id, %error, "failed to publish message to log"),
        }
        result
    }
}
