use simplenotes_registry::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The connection could not be persisted; the client would otherwise
    /// believe it is subscribed while receiving nothing.
    #[error("internal error: {0}")]
    Internal(#[from] RegistryError),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
