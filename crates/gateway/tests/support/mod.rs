#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relayhub_auth::{Identity, IssuedCredential};
use relayhub_config::{DatabaseConfig, RelayConfig};
use relayhub_database::initialize_database;
use relayhub_gateway::{ConnectionHandle, GatewayState, ServerFrame, Session};
use relayhub_stream::{LogEntry, LogError, LogResult, MemoryLog, MessageLog, RawEntry};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub struct TestRelay {
    pub state: GatewayState,
    pub log: Arc<MemoryLog>,
    pub pool: SqlitePool,
    _db_dir: TempDir,
}

impl TestRelay {
    pub async fn new() -> TestResult<Self> {
        let log = Arc::new(MemoryLog::new());
        let (state, pool, db_dir) = build_state(log.clone()).await?;
        Ok(Self {
            state,
            log,
            pool,
            _db_dir: db_dir,
        })
    }

    pub async fn being(&self, org_id: &str, name: &str) -> TestResult<IssuedCredential> {
        Ok(self.state.gate.provision(org_id, name).await?)
    }

    /// Register a fake connection for `being` without going through a socket.
    pub async fn attach(&self, being: &IssuedCredential) -> TestClient {
        attach(&self.state, being, 64).await
    }
}

pub async fn build_state(
    log: Arc<dyn MessageLog>,
) -> TestResult<(GatewayState, SqlitePool, TempDir)> {
    let db_dir = TempDir::new()?;
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_dir.path().join("relay.db").display()),
        max_connections: 4,
    };
    let pool = initialize_database(&config).await?;
    let state = GatewayState::new(pool.clone(), log, &RelayConfig::default());
    Ok((state, pool, db_dir))
}

pub async fn attach(state: &GatewayState, being: &IssuedCredential, capacity: usize) -> TestClient {
    let (tx, rx) = mpsc::channel(capacity);
    let handle = ConnectionHandle::new(tx);
    let identity = Identity {
        being_id: being.being.id.clone(),
        org_id: being.being.org_id.clone(),
    };
    state
        .registry
        .add(&identity.being_id, &identity.org_id, handle.clone())
        .await;
    TestClient {
        session: Session::new(identity, handle),
        rx,
    }
}

pub struct TestClient {
    pub session: Session,
    pub rx: mpsc::Receiver<String>,
}

impl TestClient {
    pub fn being_id(&self) -> &str {
        self.session.being_id()
    }

    /// Every frame queued so far.
    pub fn drain(&mut self) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(raw) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&raw).expect("server frame"));
        }
        frames
    }

    pub async fn next_frame(&mut self) -> ServerFrame {
        let raw = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("outbound queue closed");
        serde_json::from_str(&raw).expect("server frame")
    }
}

pub fn message_frame(to: &str, body: &str) -> String {
    serde_json::json!({ "type": "message", "to": to, "body": body }).to_string()
}

/// Log whose every operation fails.
pub struct UnavailableLog;

#[async_trait]
impl MessageLog for UnavailableLog {
    async fn append(&self, _entry: &LogEntry) -> LogResult<String> {
        Err(LogError::Unavailable("log offline".into()))
    }

    async fn ensure_group(&self, _group: &str) -> LogResult<()> {
        Err(LogError::Unavailable("log offline".into()))
    }

    async fn read_group(
        &self,
        _group: &str,
        _consumer: &str,
        _count: usize,
        _block: Duration,
    ) -> LogResult<Vec<RawEntry>> {
        Err(LogError::Unavailable("log offline".into()))
    }

    async fn ack(&self, _group: &str, _entry_id: &str) -> LogResult<()> {
        Err(LogError::Unavailable("log offline".into()))
    }

    async fn ping(&self) -> LogResult<()> {
        Err(LogError::Unavailable("log offline".into()))
    }

    fn backend(&self) -> &'static str {
        "unavailable"
    }
}
