use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use simplenotes_core::IdGenerator;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{PushError, Result};
use crate::gateway::PushGateway;

/// Outbound frames buffered per socket before the client counts as slow.
const OUTBOUND_CAPACITY: usize = 64;

/// In-process push gateway: sockets terminate in this server.
///
/// Each open socket owns the receiving half of an mpsc channel; posting
/// pushes into the sender. Dropping the sender (on delete) ends the
/// socket's outbound stream, which closes the socket.
pub struct LocalGateway {
    ids: Arc<IdGenerator>,
    channels: DashMap<String, mpsc::Sender<String>>,
}

impl LocalGateway {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            channels: DashMap::new(),
        }
    }

    /// Accept a new socket: assign it a connection id and return the stream
    /// of envelopes to write to it.
    pub fn open(&self) -> (String, mpsc::Receiver<String>) {
        let connection_id = self.ids.generate_string();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.channels.insert(connection_id.clone(), tx);
        info!(conn_id = %connection_id, "local channel opened");
        (connection_id, rx)
    }

    /// Forget a socket that closed on its own.
    pub fn close(&self, connection_id: &str) {
        if self.channels.remove(connection_id).is_some() {
            debug!(conn_id = %connection_id, "local channel closed");
        }
    }

    pub fn is_open(&self, connection_id: &str) -> bool {
        self.channels
            .get(connection_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait]
impl PushGateway for LocalGateway {
    async fn post_to_connection(&self, connection_id: &str, payload: &str) -> Result<()> {
        // Clone the sender out so no map shard lock is held while sending.
        let tx = self
            .channels
            .get(connection_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PushError::Gone {
                connection_id: connection_id.to_string(),
            })?;

        match tx.try_send(payload.to_string()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(PushError::SlowConsumer {
                connection_id: connection_id.to_string(),
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.channels.remove(connection_id);
                Err(PushError::Gone {
                    connection_id: connection_id.to_string(),
                })
            }
        }
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<()> {
        match self.channels.remove(connection_id) {
            Some(_) => {
                info!(conn_id = %connection_id, "local channel torn down");
                Ok(())
            }
            None => Err(PushError::Gone {
                connection_id: connection_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> LocalGateway {
        LocalGateway::new(Arc::new(IdGenerator::new(1).unwrap()))
    }

    #[tokio::test]
    async fn post_reaches_the_open_socket() {
        let gw = gateway();
        let (id, mut rx) = gw.open();

        gw.post_to_connection(&id, r#"{"type":"ACK"}"#).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some(r#"{"type":"ACK"}"#));
    }

    #[tokio::test]
    async fn open_assigns_distinct_ids() {
        let gw = gateway();
        let (a, _ra) = gw.open();
        let (b, _rb) = gw.open();
        assert_ne!(a, b);
        assert_eq!(gw.len(), 2);
    }

    #[tokio::test]
    async fn delete_closes_the_stream_and_is_safe_to_repeat() {
        let gw = gateway();
        let (id, mut rx) = gw.open();

        gw.delete_connection(&id).await.unwrap();
        assert!(rx.recv().await.is_none(), "sender dropped, stream ends");
        assert!(matches!(
            gw.delete_connection(&id).await,
            Err(PushError::Gone { .. })
        ));
        assert!(matches!(
            gw.post_to_connection(&id, "{}").await,
            Err(PushError::Gone { .. })
        ));
    }

    #[tokio::test]
    async fn post_to_dropped_receiver_reports_gone() {
        let gw = gateway();
        let (id, rx) = gw.open();
        drop(rx);

        assert!(!gw.is_open(&id));
        assert!(matches!(
            gw.post_to_connection(&id, "{}").await,
            Err(PushError::Gone { .. })
        ));
        assert!(gw.is_empty());
    }

    #[tokio::test]
    async fn full_queue_reports_slow_consumer() {
        let gw = gateway();
        let (id, _rx) = gw.open();
        for _ in 0..OUTBOUND_CAPACITY {
            gw.post_to_connection(&id, "{}").await.unwrap();
        }
        assert!(matches!(
            gw.post_to_connection(&id, "{}").await,
            Err(PushError::SlowConsumer { .. })
        ));
    }
}
