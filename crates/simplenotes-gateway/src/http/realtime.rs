//! Channel lifecycle routes, called by the push gateway on behalf of a
//! client socket: `$connect`, `$default` and `$disconnect`.
//!
//! Only connect can fail. Message and disconnect always answer 200 so the
//! gateway never retries or drops the socket on our account.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use simplenotes_core::config::MAX_MESSAGE_BYTES;
use simplenotes_core::SimplenotesError;
use simplenotes_protocol::InboundMessage;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::auth::{claims_from_headers, connection_id_header};

/// Error response: `{"code": "..."}` with a status derived from the error.
pub struct ApiError(pub SimplenotesError);

impl From<SimplenotesError> for ApiError {
    fn from(e: SimplenotesError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SimplenotesError::MissingParam { .. } => StatusCode::BAD_REQUEST,
            SimplenotesError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "code": self.0.code() }))).into_response()
    }
}

/// POST /ws/connect
pub async fn connect_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let connection_id = connection_id_header(&headers)?;
    let claims = claims_from_headers(&headers).inspect_err(|e| {
        warn!(conn_id = %connection_id, error = %e, "connect rejected");
    })?;

    state
        .service
        .register_connection(claims.user_id, &connection_id, claims.token_exp)
        .map_err(|e| SimplenotesError::Internal(e.to_string()))?;
    Ok(StatusCode::OK)
}

/// POST /ws/message
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Ok(connection_id) = connection_id_header(&headers) else {
        debug!("message without connection id ignored");
        return StatusCode::OK;
    };
    if body.len() > MAX_MESSAGE_BYTES {
        warn!(conn_id = %connection_id, size = body.len(), "oversized message ignored");
        return StatusCode::OK;
    }

    match std::str::from_utf8(&body).map(InboundMessage::parse) {
        Ok(Ok(message)) => state.service.handle_message(&message, &connection_id),
        _ => debug!(conn_id = %connection_id, "malformed message ignored"),
    }
    StatusCode::OK
}

/// POST /ws/disconnect
pub async fn disconnect_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> StatusCode {
    if let Ok(connection_id) = connection_id_header(&headers) {
        state.service.remove_connection(&connection_id);
    }
    StatusCode::OK
}
