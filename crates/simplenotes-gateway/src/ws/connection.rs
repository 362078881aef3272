use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use simplenotes_core::config::MAX_MESSAGE_BYTES;
use simplenotes_notify::NotificationService;
use simplenotes_protocol::InboundMessage;
use simplenotes_push::LocalGateway;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::auth::{claims_from_headers, Claims};
use crate::http::realtime::ApiError;

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
///
/// Only routed in local mode. The upgrade request carries the same trusted
/// identity headers as `/ws/connect`; the connection id is ours to assign.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let claims = match claims_from_headers(&headers) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "websocket upgrade rejected");
            return ApiError(e).into_response();
        }
    };
    let Some(local) = state.local.clone() else {
        return ApiError(simplenotes_core::SimplenotesError::Internal(
            "local sockets disabled".into(),
        ))
        .into_response();
    };
    ws.max_message_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| run_connection(socket, state, local, claims))
}

/// Per-connection event loop, lives for the entire WS session.
async fn run_connection(
    socket: WebSocket,
    state: Arc<AppState>,
    local: Arc<LocalGateway>,
    claims: Claims,
) {
    let (conn_id, outbound) = local.open();
    if let Err(e) = state
        .service
        .register_connection(claims.user_id, &conn_id, claims.token_exp)
    {
        warn!(conn_id = %conn_id, error = %e, "closing unregistered socket");
        local.close(&conn_id);
        return;
    }
    info!(conn_id = %conn_id, user_id = %claims.user_id, "new WS connection");

    let (tx, rx) = socket.split();
    pump(&state.service, &conn_id, tx, rx, outbound).await;

    local.close(&conn_id);
    state.service.remove_connection(&conn_id);
    info!(conn_id = %conn_id, "WS connection closed");
}

/// Shuttle frames until the client closes or the gateway tears the channel
/// down (its sender dropped, so `outbound` yields `None`).
async fn pump<S, R, E>(
    service: &NotificationService,
    conn_id: &str,
    mut tx: S,
    mut rx: R,
    mut outbound: mpsc::Receiver<String>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match InboundMessage::parse(text.as_str()) {
                            Ok(message) => service.handle_message(&message, conn_id),
                            Err(_) => debug!(conn_id = %conn_id, "malformed frame ignored"),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }

            envelope = outbound.recv() => {
                match envelope {
                    Some(payload) => {
                        if tx.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
}
