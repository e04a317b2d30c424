use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::auth;
use crate::services::access::Actor;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct LiveParams {
    pub token: Option<String>,
}

/// Browsers cannot set headers on a websocket handshake, so the token
/// travels in the query string.
pub async fn live_updates(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LiveParams>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing token".to_string()))?;
    let actor = auth::authenticate(&state, &token).await?;

    Ok(ws.on_upgrade(move |socket| stream_events(socket, state, actor)))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>, actor: Actor) {
    let connection_id = state.events.register_connection();
    tracing::info!(%connection_id, user_id = %actor.user_id, role = %actor.role, "live client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut feed = state.events.feed(actor, state.store.clone());

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = feed.next().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode live event");
                    continue;
                }
            };
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; reading keeps pings answered and notices closes.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.events.unregister_connection(connection_id);
    tracing::info!(%connection_id, "live client disconnected");
}
