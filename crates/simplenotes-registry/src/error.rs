use thiserror::Error;

/// Failures reading or writing the connection registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A previous holder of the registry lock panicked.
    #[error("registry lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, RegistryError>;
