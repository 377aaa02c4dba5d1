use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::registry::ConnectionInfo;
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub connections: usize,
    pub database: &'static str,
    pub log: &'static str,
    #[serde(rename = "logBackend")]
    pub log_backend: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub connections: usize,
    pub online_beings: Vec<ConnectionInfo>,
}

pub async fn health_check(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let database = match relayhub_database::ping(&state.pool).await {
        Ok(()) => "ok",
        Err(error) => {
            tracing::warn!(%error, "database health check failed");
            "error"
        }
    };
    let log = match state.log.ping().await {
        Ok(()) => "ok",
        Err(error) => {
            tracing::warn!(%error, "log health check failed");
            "error"
        }
    };
    let status = if database == "ok" && log == "ok" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        timestamp: Utc::now().to_rfc3339(),
        connections: state.registry.count().await,
        database,
        log,
        log_backend: state.log.backend(),
    })
}

pub async fn stats(State(state): State<Arc<GatewayState>>) -> Json<StatsResponse> {
    let online_beings = state.registry.list_all().await;
    Json(StatsResponse {
        connections: online_beings.len(),
        online_beings,
    })
}
