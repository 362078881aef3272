//! Shared building blocks for the simplenotes realtime stack: configuration,
//! the top-level error type, timestamps, permission flags and id generation.

pub mod config;
pub mod error;
pub mod id;
pub mod types;

pub use error::{Result, SimplenotesError};
pub use id::IdGenerator;
pub use types::{now_millis, Permission, UserId};
