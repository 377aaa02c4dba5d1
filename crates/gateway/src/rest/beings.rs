//! Being directory endpoints. Credential hashes are never serialized.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use relayhub_database::Being;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct BeingListQuery {
    pub org_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BeingListResponse {
    pub beings: Vec<Being>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct BeingResponse {
    pub being: Being,
}

pub async fn list_beings(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<BeingListQuery>,
) -> GatewayResult<Json<BeingListResponse>> {
    let beings = match query.org_id.as_deref().filter(|org| !org.is_empty()) {
        Some(org_id) => state.beings.list_by_org(org_id).await?,
        None => state.beings.list_all().await?,
    };

    Ok(Json(BeingListResponse {
        count: beings.len(),
        beings,
    }))
}

pub async fn get_being(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<BeingResponse>> {
    let being = state
        .beings
        .find_by_id(&id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Being not found".to_string()))?;

    Ok(Json(BeingResponse { being }))
}
