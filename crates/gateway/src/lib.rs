//! # RelayHub Gateway Crate
//!
//! Connection-facing half of the relay: WebSocket sessions, the in-memory
//! connection registry, inbound routing and the consumer-group delivery
//! worker, plus a small read-only HTTP API.
//!
//! ## Architecture
//!
//! - **WebSocket**: authenticated sessions at `/ws/:being_id?token=...`
//! - **Registry**: one live connection per (org, being)
//! - **Router**: persist, publish, deliver and ack inbound messages
//! - **Consumer**: redundant delivery from the durable log
//! - **REST**: health, stats and message history

pub mod consumer;
pub mod error;
pub mod frames;
pub mod presence;
pub mod registry;
pub mod rest;
pub mod router;
pub mod state;
pub mod websocket;

pub use consumer::{BatchReport, ConsumerHandle, DeliverySettings, DeliveryWorker};
pub use error::{GatewayError, GatewayResult};
pub use frames::{ClientFrame, FrameError, ServerFrame};
pub use presence::PresenceService;
pub use registry::{ConnectionHandle, ConnectionInfo, ConnectionKey, ConnectionRegistry};
pub use router::{MessageRouter, RouteOutcome, Session};
pub use state::GatewayState;

use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main application router with all routes
pub fn build_router(state: GatewayState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .merge(rest::create_rest_routes())
        .route("/ws/:being_id", get(websocket::websocket_handler))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
