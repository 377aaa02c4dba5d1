//! In-process log with Redis-compatible consumer group semantics.
//!
//! Used by tests and, when explicitly enabled, as a degraded single-node
//! fallback. Entries do not survive a restart. Once every group has read and
//! acknowledged an entry it is dropped, so a group created later only sees
//! entries still retained.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::entry::{LogEntry, RawEntry};
use crate::error::{LogError, LogResult};
use crate::MessageLog;

struct GroupState {
    /// Absolute index of the first entry never handed to any consumer of the group.
    next_index: usize,
    /// Delivered but unacknowledged entries: id to (absolute index, consumer).
    pending: HashMap<String, (usize, String)>,
}

impl GroupState {
    /// Lowest absolute index the group may still need.
    fn floor(&self) -> usize {
        self.pending
            .values()
            .map(|(index, _)| *index)
            .min()
            .unwrap_or(self.next_index)
            .min(self.next_index)
    }
}

#[derive(Default)]
struct LogState {
    entries: VecDeque<RawEntry>,
    /// Absolute index of `entries[0]`.
    base: usize,
    groups: HashMap<String, GroupState>,
    last_ms: i64,
    seq: u64,
}

impl LogState {
    /// Drop entries every group has read and acknowledged.
    fn compact(&mut self) {
        let Some(floor) = self.groups.values().map(GroupState::floor).min() else {
            return;
        };
        while self.base < floor && self.entries.pop_front().is_some() {
            self.base += 1;
        }
    }

    fn next_id(&mut self) -> String {
        let now = Utc::now().timestamp_millis();
        if now > self.last_ms {
            self.last_ms = now;
            self.seq = 0;
        } else {
            self.seq += 1;
        }
        format!("{}-{}", self.last_ms, self.seq)
    }
}

#[derive(Default)]
pub struct MemoryLog {
    state: Mutex<LogState>,
    appended: Notify,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently retained.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries delivered to the group and not yet acknowledged.
    pub fn pending_count(&self, group: &str) -> usize {
        self.lock()
            .groups
            .get(group)
            .map(|state| state.pending.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageLog for MemoryLog {
    async fn append(&self, entry: &LogEntry) -> LogResult<String> {
        let id = {
            let mut state = self.lock();
            let id = state.next_id();
            let fields = entry
                .to_fields()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            state.entries.push_back(RawEntry {
                id: id.clone(),
                fields,
            });
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn ensure_group(&self, group: &str) -> LogResult<()> {
        let mut state = self.lock();
        let base = state.base;
        state
            .groups
            .entry(group.to_string())
            .or_insert_with(|| GroupState {
                next_index: base,
                pending: HashMap::new(),
            });
        Ok(())
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> LogResult<Vec<RawEntry>> {
        let deadline = Instant::now() + block;

        loop {
            // Registered before the state check so an append in between still wakes us.
            let appended = self.appended.notified();
            {
                let mut guard = self.lock();
                let state = &mut *guard;
                let group_state = state
                    .groups
                    .get_mut(group)
                    .ok_or_else(|| LogError::UnknownGroup(group.to_string()))?;

                let available = state.base + state.entries.len();
                if group_state.next_index < available {
                    let start = group_state.next_index;
                    let end = (start + count.max(1)).min(available);
                    let batch: Vec<RawEntry> = state
                        .entries
                        .range(start - state.base..end - state.base)
                        .cloned()
                        .collect();
                    for (offset, entry) in batch.iter().enumerate() {
                        group_state
                            .pending
                            .insert(entry.id.clone(), (start + offset, consumer.to_string()));
                    }
                    group_state.next_index = end;
                    return Ok(batch);
                }
            }

            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, group: &str, entry_id: &str) -> LogResult<()> {
        let mut state = self.lock();
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| LogError::UnknownGroup(group.to_string()))?;
        if group_state.pending.remove(entry_id).is_some() {
            state.compact();
        }
        Ok(())
    }

    async fn ping(&self) -> LogResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
