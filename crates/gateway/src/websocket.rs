//! WebSocket endpoint: one reader loop and one writer task per connection.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use relayhub_auth::Identity;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::frames::ServerFrame;
use crate::registry::ConnectionHandle;
use crate::router::Session;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(being_id): Path<String>,
    Query(params): Query<ConnectQuery>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Response> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::AuthenticationFailed("missing token".to_string()))?;

    let identity = state
        .gate
        .authenticate(&being_id, &token)
        .await
        .ok_or_else(|| GatewayError::AuthenticationFailed("invalid credentials".to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, identity: Identity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(state.outbound_buffer);
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(error) = ws_sender.send(WsMessage::Text(frame)).await {
                debug!(%error, "websocket write failed");
                break;
            }
        }
        let _ = ws_sender.send(WsMessage::Close(None)).await;
    });

    let handle = ConnectionHandle::new(out_tx);
    let mut superseded = handle.closed();
    let session = Session::new(identity, handle);

    state
        .registry
        .add(session.being_id(), session.org_id(), session.handle.clone())
        .await;
    info!(
        being_id = session.being_id(),
        org_id = session.org_id(),
        connection_id = %session.handle.id(),
        "websocket connected"
    );
    state.presence.connected(&session.identity).await;

    loop {
        tokio::select! {
            _ = superseded.changed() => {
                info!(being_id = session.being_id(), "connection superseded");
                break;
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    state.router.handle_text(&session, &text).await;
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        state.router.handle_text(&session, &text).await;
                    }
                    Err(_) => {
                        session
                            .reply(&ServerFrame::error("binary frames must contain UTF-8 JSON"))
                            .await;
                    }
                },
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    debug!(being_id = session.being_id(), %error, "websocket read failed");
                    break;
                }
            }
        }
    }

    let removed = state
        .registry
        .remove_connection(session.being_id(), session.org_id(), session.handle.id())
        .await;
    if removed {
        state.presence.disconnected(&session.identity).await;
    }
    info!(being_id = session.being_id(), removed, "websocket disconnected");

    // Dropping the last sender lets the writer flush and close the socket.
    drop(session);
    let _ = sender_task.await;
}
