use async_trait::async_trait;

use crate::error::PushError;

/// Delivery side of a push channel.
///
/// Both calls are best-effort and safe to repeat on a dead channel; an
/// error usually just means the client is already gone.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Send one serialized envelope to `connection_id`.
    async fn post_to_connection(&self, connection_id: &str, payload: &str)
        -> Result<(), PushError>;

    /// Tear the channel down at the transport. Distinct from removing the
    /// registry row.
    async fn delete_connection(&self, connection_id: &str) -> Result<(), PushError>;
}
