use serde::{Deserialize, Serialize};
use simplenotes_core::UserId;

/// One live push channel bound to one user.
///
/// A user may hold several at once (one per device/tab).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Opaque id assigned by the push gateway at handshake time.
    pub connection_id: String,
    pub user_id: UserId,
    /// Epoch ms after which the channel's authorization is void, regardless
    /// of heartbeats. Taken from the token expiry at registration.
    pub expires_at: i64,
    /// Epoch ms of the last client ping. Never moves backwards.
    pub last_heartbeat_at: i64,
    /// Epoch ms of registration.
    pub created_at: i64,
}

impl Connection {
    /// A freshly registered channel: heartbeat and creation both `now`, so
    /// the client is not considered idle before its first ping.
    pub fn new(
        connection_id: impl Into<String>,
        user_id: UserId,
        expires_at: i64,
        now: i64,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            user_id,
            expires_at,
            last_heartbeat_at: now,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }

    pub fn is_idle(&self, heartbeat_cutoff: i64) -> bool {
        self.last_heartbeat_at < heartbeat_cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_connection_starts_with_fresh_heartbeat() {
        let c = Connection::new("abc=", UserId(1), 5_000, 1_000);
        assert_eq!(c.last_heartbeat_at, 1_000);
        assert_eq!(c.created_at, 1_000);
        assert!(!c.is_expired(1_000));
        assert!(c.is_expired(5_001));
        assert!(!c.is_expired(5_000));
        assert!(c.is_idle(1_001));
    }
}
