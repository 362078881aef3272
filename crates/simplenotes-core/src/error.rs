use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimplenotesError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Missing parameter: {name}")]
    MissingParam { name: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SimplenotesError {
    /// Short error code string sent to clients in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SimplenotesError::Config(_) => "CONFIG_ERROR",
            SimplenotesError::AuthFailed(_) => "AUTH_FAILED",
            SimplenotesError::MissingParam { .. } => "MISSING_PARAM",
            SimplenotesError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SimplenotesError>;
