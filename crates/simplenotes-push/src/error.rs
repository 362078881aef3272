use thiserror::Error;

/// Failures delivering to, or tearing down, a client channel.
///
/// Callers treat every variant the same way: log and move on.
#[derive(Debug, Error)]
pub enum PushError {
    /// The channel no longer exists at the transport.
    #[error("connection gone: {connection_id}")]
    Gone { connection_id: String },

    /// The client is not draining its outbound queue.
    #[error("connection {connection_id} is not keeping up")]
    SlowConsumer { connection_id: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The management API answered with a non-success status.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("AWS credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid gateway endpoint: {0}")]
    InvalidEndpoint(String),
}

pub type Result<T> = std::result::Result<T, PushError>;
