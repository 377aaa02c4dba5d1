//! Process-local registry of live being connections.
//!
//! At most one connection exists per (org, being). Registering again replaces
//! the previous entry and signals the superseded transport to close.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub org_id: String,
    pub being_id: String,
}

impl ConnectionKey {
    pub fn new(org_id: impl Into<String>, being_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            being_id: being_id.into(),
        }
    }
}

/// Write side of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    outbound: mpsc::Sender<String>,
    close: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        let (close, _) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            outbound,
            close: Arc::new(close),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        !self.outbound.is_closed() && !*self.close.borrow()
    }

    /// Queue a frame without waiting. False when the queue is full or closed.
    pub fn try_send(&self, payload: &str) -> bool {
        self.is_open() && self.outbound.try_send(payload.to_string()).is_ok()
    }

    /// Queue a frame, waiting for room in the queue.
    pub async fn send(&self, payload: String) -> bool {
        self.is_open() && self.outbound.send(payload).await.is_ok()
    }

    /// Ask the owning session to shut down.
    pub fn close(&self) {
        self.close.send_replace(true);
    }

    /// Watch flipped to `true` by `close`.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.close.subscribe()
    }
}

struct Connection {
    handle: ConnectionHandle,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub being_id: String,
    pub org_id: String,
    pub connection_id: Uuid,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<ConnectionKey, Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns the superseded handle, already told to close.
    pub async fn add(
        &self,
        being_id: &str,
        org_id: &str,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let now = Utc::now();
        let key = ConnectionKey::new(org_id, being_id);
        let connection_id = handle.id();

        let previous = self.inner.lock().await.insert(
            key,
            Connection {
                handle,
                connected_at: now,
                last_activity: now,
            },
        );

        let superseded = previous.map(|connection| connection.handle);
        if let Some(old) = &superseded {
            tracing::info!(
                being_id,
                org_id,
                old_connection = %old.id(),
                new_connection = %connection_id,
                "replacing existing connection"
            );
            old.close();
        } else {
            tracing::debug!(being_id, org_id, %connection_id, "registered connection");
        }
        superseded
    }

    pub async fn remove(&self, being_id: &str, org_id: &str) -> bool {
        let key = ConnectionKey::new(org_id, being_id);
        self.inner.lock().await.remove(&key).is_some()
    }

    /// Remove the entry only while it still belongs to `connection_id`.
    pub async fn remove_connection(&self, being_id: &str, org_id: &str, connection_id: Uuid) -> bool {
        let key = ConnectionKey::new(org_id, being_id);
        let mut connections = self.inner.lock().await;
        match connections.get(&key) {
            Some(connection) if connection.handle.id() == connection_id => {
                connections.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub async fn is_online(&self, being_id: &str, org_id: &str) -> bool {
        let key = ConnectionKey::new(org_id, being_id);
        self.inner
            .lock()
            .await
            .get(&key)
            .map(|connection| connection.handle.is_open())
            .unwrap_or(false)
    }

    /// Non-blocking write to one being. Never errors; false means not delivered.
    pub async fn send_to(&self, being_id: &str, org_id: &str, payload: &str) -> bool {
        let key = ConnectionKey::new(org_id, being_id);
        let mut connections = self.inner.lock().await;
        let Some(connection) = connections.get_mut(&key) else {
            return false;
        };

        if connection.handle.try_send(payload) {
            connection.last_activity = Utc::now();
            true
        } else {
            tracing::debug!(being_id, org_id, "connection not writable");
            false
        }
    }

    /// Write to every open connection of `org_id` except `exclude`.
    pub async fn broadcast(&self, org_id: &str, payload: &str, exclude: Option<&str>) -> usize {
        let now = Utc::now();
        let mut connections = self.inner.lock().await;
        let mut sent = 0;

        for (key, connection) in connections.iter_mut() {
            if key.org_id != org_id || Some(key.being_id.as_str()) == exclude {
                continue;
            }
            if connection.handle.try_send(payload) {
                connection.last_activity = now;
                sent += 1;
            } else {
                tracing::debug!(being_id = %key.being_id, org_id, "skipping unwritable connection");
            }
        }
        sent
    }

    pub async fn count(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn list_all(&self) -> Vec<ConnectionInfo> {
        let connections = self.inner.lock().await;
        let mut infos: Vec<ConnectionInfo> = connections
            .iter()
            .map(|(key, connection)| ConnectionInfo {
                being_id: key.being_id.clone(),
                org_id: key.org_id.clone(),
                connection_id: connection.handle.id(),
                connected_at: connection.connected_at,
                last_activity: connection.last_activity,
            })
            .collect();
        infos.sort_by(|a, b| (&a.org_id, &a.being_id).cmp(&(&b.org_id, &b.being_id)));
        infos
    }
}
