//! Wire model for push channels: the closed set of [`SocketEvent`]s and
//! the `{"type", "data"}` envelope every message travels in.

pub mod envelope;
pub mod events;

pub use envelope::InboundMessage;
pub use events::{
    ConnectionKill, EventType, KillCode, NoteDeleted, NoteSnapshot, SocketEvent, UserSnapshot,
};
