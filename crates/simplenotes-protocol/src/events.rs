use serde::{Deserialize, Serialize};
use simplenotes_core::Permission;

/// Every message that can travel over a push channel.
///
/// Serialized adjacently tagged, which is exactly the envelope shape:
/// `{"type": "NOTE_DELETED", "data": {"id": 42}}`. Variants without a
/// payload omit `data` entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketEvent {
    /// Client → server heartbeat.
    Ping,
    /// Server → client heartbeat acknowledgement.
    Ack,
    /// Poison pill: the server is about to cut this channel.
    ConnectionKill(ConnectionKill),
    /// The channel's authorization expired; the client should not reconnect
    /// with the same token.
    SessionExpired,
    NoteCreated(NoteSnapshot),
    NoteUpdated(NoteSnapshot),
    NoteDeleted(NoteDeleted),
    UserUpdated(UserSnapshot),
}

impl SocketEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            SocketEvent::Ping => EventType::Ping,
            SocketEvent::Ack => EventType::Ack,
            SocketEvent::ConnectionKill(_) => EventType::ConnectionKill,
            SocketEvent::SessionExpired => EventType::SessionExpired,
            SocketEvent::NoteCreated(_) => EventType::NoteCreated,
            SocketEvent::NoteUpdated(_) => EventType::NoteUpdated,
            SocketEvent::NoteDeleted(_) => EventType::NoteDeleted,
            SocketEvent::UserUpdated(_) => EventType::UserUpdated,
        }
    }

    pub fn kill(code: KillCode) -> Self {
        SocketEvent::ConnectionKill(ConnectionKill::new(code))
    }
}

/// Type tags, as they appear in the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Ping,
    Ack,
    ConnectionKill,
    SessionExpired,
    NoteCreated,
    NoteUpdated,
    NoteDeleted,
    UserUpdated,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::Ping,
        EventType::Ack,
        EventType::ConnectionKill,
        EventType::SessionExpired,
        EventType::NoteCreated,
        EventType::NoteUpdated,
        EventType::NoteDeleted,
        EventType::UserUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Ping => "PING",
            EventType::Ack => "ACK",
            EventType::ConnectionKill => "CONNECTION_KILL",
            EventType::SessionExpired => "SESSION_EXPIRED",
            EventType::NoteCreated => "NOTE_CREATED",
            EventType::NoteUpdated => "NOTE_UPDATED",
            EventType::NoteDeleted => "NOTE_DELETED",
            EventType::UserUpdated => "USER_UPDATED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// Why a channel is being force-closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KillCode {
    SuspendedAccount,
    IdleTimeout,
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionKill {
    pub code: KillCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConnectionKill {
    pub fn new(code: KillCode) -> Self {
        Self { code, reason: None }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Note as returned by the notes API; pushed on create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub visibility: String,
    pub note_type: String,
    pub content_size: i64,
    pub created_by_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDeleted {
    pub id: i64,
}

/// User as returned by the users API; pushed to the user's own channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i64,
    pub username: String,
    pub permissions: Permission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserSnapshot {
    pub fn is_suspended(&self) -> bool {
        self.suspended == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_every_tag() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>(), Ok(t));
        }
        assert!("NOTE_CREATE".parse::<EventType>().is_err());
    }

    #[test]
    fn serde_tag_matches_as_str() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn kill_helper_sets_code_without_reason() {
        match SocketEvent::kill(KillCode::Logout) {
            SocketEvent::ConnectionKill(k) => {
                assert_eq!(k.code, KillCode::Logout);
                assert!(k.reason.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
