//! Consumer-group delivery worker.
//!
//! Reads the durable log through a shared group and retries delivery for
//! entries whose record is still pending. Every decodable entry is
//! acknowledged, delivered or not.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relayhub_config::StreamConfig;
use relayhub_database::{Message, MessageRepository};
use relayhub_stream::{LogResult, MessageLog, RawEntry};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::frames::ServerFrame;
use crate::registry::ConnectionRegistry;

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub group: String,
    pub consumer: String,
    pub batch_size: usize,
    pub block: Duration,
    pub retry_backoff: Duration,
}

impl DeliverySettings {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            group: config.consumer_group.clone(),
            consumer: config.resolved_consumer_name(),
            batch_size: config.batch_size.max(1),
            block: Duration::from_millis(config.block_ms.max(1)),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Per-batch tally, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub delivered: usize,
    pub skipped: usize,
    pub undecodable: usize,
    pub acked: usize,
}

#[derive(Clone)]
pub struct DeliveryWorker {
    log: Arc<dyn MessageLog>,
    registry: ConnectionRegistry,
    messages: MessageRepository,
    settings: DeliverySettings,
}

/// Running worker. Dropping it stops the loop after the read in flight.
pub struct ConsumerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ConsumerHandle {
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(error) = self.join.await {
            warn!(%error, "delivery worker task ended abnormally");
        }
    }
}

impl DeliveryWorker {
    pub fn new(
        log: Arc<dyn MessageLog>,
        registry: ConnectionRegistry,
        messages: MessageRepository,
        settings: DeliverySettings,
    ) -> Self {
        Self {
            log,
            registry,
            messages,
            settings,
        }
    }

    /// Create the consumer group if needed and start the read loop.
    pub async fn start(self) -> LogResult<ConsumerHandle> {
        self.log.ensure_group(&self.settings.group).await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(stop_rx));
        Ok(ConsumerHandle { stop_tx, join })
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(
            group = %self.settings.group,
            consumer = %self.settings.consumer,
            backend = self.log.backend(),
            "delivery worker started"
        );

        loop {
            let stopped = *stop.borrow() || stop.has_changed().is_err();
            if stopped {
                break;
            }

            let read = self
                .log
                .read_group(
                    &self.settings.group,
                    &self.settings.consumer,
                    self.settings.batch_size,
                    self.settings.block,
                )
                .await;

            match read {
                Ok(entries) if entries.is_empty() => {}
                Ok(entries) => {
                    let report = self.process_batch(&entries).await;
                    debug!(?report, "processed log batch");
                }
                Err(error) => {
                    warn!(%error, backoff_ms = self.settings.retry_backoff.as_millis() as u64, "log read failed");
                    tokio::select! {
                        changed = stop.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.settings.retry_backoff) => {}
                    }
                }
            }
        }

        info!(consumer = %self.settings.consumer, "delivery worker stopped");
    }

    pub async fn process_batch(&self, entries: &[RawEntry]) -> BatchReport {
        let mut report = BatchReport::default();
        let mut seen = HashSet::new();

        for raw in entries {
            let message = match raw.decode().and_then(|entry| entry.message()) {
                Ok(message) => message,
                Err(error) => {
                    // Left pending in the group for inspection.
                    warn!(entry_id = %raw.id, %error, "skipping undecodable log entry");
                    report.undecodable += 1;
                    continue;
                }
            };

            if seen.insert(message.id.clone()) && self.deliver(&message).await {
                report.delivered += 1;
            } else {
                report.skipped += 1;
            }

            match self.log.ack(&self.settings.group, &raw.id).await {
                Ok(()) => report.acked += 1,
                Err(error) => warn!(entry_id = %raw.id, %error, "failed to ack log entry"),
            }
        }
        report
    }

    async fn deliver(&self, message: &Message) -> bool {
        if message.is_broadcast() {
            return false;
        }

        match self.messages.status_of(&message.id).await {
            Ok(Some(status)) if status.is_delivered() => {
                debug!(message_id = %message.id, %status, "already delivered");
                return false;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(message_id = %message.id, "log entry without stored record");
                return false;
            }
            Err(error) => {
                warn!(message_id = %message.id, %error, "status lookup failed");
                return false;
            }
        }

        let payload = ServerFrame::message(message).encode();
        if !self
            .registry
            .send_to(&message.to, &message.org_id, &payload)
            .await
        {
            return false;
        }

        if let Err(error) = self.messages.mark_delivered(&message.id, Utc::now()).await {
            warn!(message_id = %message.id, %error, "failed to mark message delivered");
        }
        debug!(message_id = %message.id, to = %message.to, "delivered from log");
        true
    }
}
