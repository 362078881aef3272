//! Typed extraction of the values the upstream authorizer forwards.
//!
//! The gateway sits behind a trusted proxy (API Gateway authorizer or the
//! app's own edge) that has already verified the bearer token. What reaches
//! us is a set of plain headers; each is parsed by its own function into a
//! typed value, and anything malformed is rejected here.

use axum::http::HeaderMap;
use simplenotes_core::{now_millis, SimplenotesError, UserId};

pub const CONNECTION_ID_HEADER: &str = "x-connection-id";
pub const USER_ID_HEADER: &str = "x-user-id";
pub const TOKEN_EXP_HEADER: &str = "x-token-exp";

/// Identity of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub user_id: UserId,
    /// Token `exp` claim, epoch seconds.
    pub token_exp: i64,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// The channel id the push gateway assigned to this socket.
pub fn connection_id_header(headers: &HeaderMap) -> Result<String, SimplenotesError> {
    header_str(headers, CONNECTION_ID_HEADER)
        .map(String::from)
        .ok_or_else(|| SimplenotesError::MissingParam {
            name: "connectionId".into(),
        })
}

/// Caller identity from the authorizer headers. A missing, malformed, or
/// already expired claim is an authentication failure.
pub fn claims_from_headers(headers: &HeaderMap) -> Result<Claims, SimplenotesError> {
    let user_id = header_str(headers, USER_ID_HEADER)
        .ok_or_else(|| SimplenotesError::AuthFailed("missing user id".into()))?
        .parse::<i64>()
        .map_err(|_| SimplenotesError::AuthFailed("malformed user id".into()))?;

    let token_exp = header_str(headers, TOKEN_EXP_HEADER)
        .ok_or_else(|| SimplenotesError::AuthFailed("missing token expiry".into()))?
        .parse::<i64>()
        .map_err(|_| SimplenotesError::AuthFailed("malformed token expiry".into()))?;

    if token_exp.saturating_mul(1000) <= now_millis() {
        return Err(SimplenotesError::AuthFailed("token expired".into()));
    }

    Ok(Claims {
        user_id: UserId(user_id),
        token_exp,
    })
}
