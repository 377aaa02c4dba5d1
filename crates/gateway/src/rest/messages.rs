//! Message history endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use relayhub_database::{Message, MessageQuery};
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<Message>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationQuery {
    pub org_id: Option<String>,
    pub limit: Option<i64>,
}

impl From<Vec<Message>> for MessageListResponse {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            count: messages.len(),
            messages,
        }
    }
}

pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<MessageQuery>,
) -> GatewayResult<Json<MessageListResponse>> {
    let messages = state.messages.query(&query).await?;
    Ok(Json(messages.into()))
}

pub async fn get_message(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> GatewayResult<Json<MessageResponse>> {
    let message = state
        .messages
        .find_by_id(&id)
        .await?
        .ok_or_else(|| GatewayError::NotFound("Message not found".to_string()))?;

    Ok(Json(MessageResponse { message }))
}

pub async fn conversation(
    State(state): State<Arc<GatewayState>>,
    Path((first, second)): Path<(String, String)>,
    Query(query): Query<ConversationQuery>,
) -> GatewayResult<Json<MessageListResponse>> {
    let messages = state
        .messages
        .conversation(&first, &second, query.org_id.as_deref(), query.limit)
        .await?;
    Ok(Json(messages.into()))
}
