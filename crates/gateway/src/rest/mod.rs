//! REST API endpoints for the gateway

pub mod beings;
pub mod health;
pub mod messages;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::GatewayState;

pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/stats", get(health::stats))
        .route("/api/beings", get(beings::list_beings))
        .route("/api/beings/:id", get(beings::get_being))
        .route("/api/messages", get(messages::list_messages))
        .route(
            "/api/messages/conversation/:first/:second",
            get(messages::conversation),
        )
        .route("/api/messages/:id", get(messages::get_message))
}
