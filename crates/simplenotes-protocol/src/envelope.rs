use serde::{Deserialize, Serialize};

use crate::events::{EventType, SocketEvent};

impl SocketEvent {
    /// Serialize into the outbound envelope `{"type": .., "data": ..}`.
    pub fn to_envelope(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an envelope produced by [`SocketEvent::to_envelope`].
    pub fn from_envelope(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Client → server frame. Only the `type` tag is read; anything else the
/// client sends is ignored.
/// Wire: `{ "type": "PING" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
}

impl InboundMessage {
    pub fn new(kind: EventType) -> Self {
        Self {
            message_type: kind.as_str().to_string(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The recognised tag, or `None` for types this server does not know.
    pub fn kind(&self) -> Option<EventType> {
        self.message_type.parse().ok()
    }
}
