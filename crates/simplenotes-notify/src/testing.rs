//! Hand-written fakes shared by the service and reaper tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use simplenotes_core::config::RealtimeConfig;
use simplenotes_core::UserId;
use simplenotes_push::{PushError, PushGateway};
use simplenotes_registry::{
    Connection, ConnectionRegistry, RegistryError, SqliteConnectionRegistry,
};

use crate::service::NotificationService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Post { conn: String, payload: String },
    Delete { conn: String },
}

/// Records every gateway call in order; selected ids can be made to fail.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Call>>,
    failing_posts: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub fn fail_posts_to(&self, conn: &str) {
        self.failing_posts.lock().unwrap().insert(conn.to_string());
    }

    pub fn fail_deletes_of(&self, conn: &str) {
        self.failing_deletes.lock().unwrap().insert(conn.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Post { conn, payload } => Some((conn, payload)),
                Call::Delete { .. } => None,
            })
            .collect()
    }

    pub fn posts_to(&self, conn: &str) -> Vec<String> {
        self.posts()
            .into_iter()
            .filter(|(c, _)| c == conn)
            .map(|(_, p)| p)
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { conn } => Some(conn),
                Call::Post { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn post_to_connection(&self, connection_id: &str, payload: &str) -> Result<(), PushError> {
        self.calls.lock().unwrap().push(Call::Post {
            conn: connection_id.to_string(),
            payload: payload.to_string(),
        });
        if self.failing_posts.lock().unwrap().contains(connection_id) {
            return Err(PushError::Gone {
                connection_id: connection_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_connection(&self, connection_id: &str) -> Result<(), PushError> {
        self.calls.lock().unwrap().push(Call::Delete {
            conn: connection_id.to_string(),
        });
        if self.failing_deletes.lock().unwrap().contains(connection_id) {
            return Err(PushError::Gone {
                connection_id: connection_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Registry whose every call fails, as if the database were unreachable.
pub struct BrokenRegistry;

impl ConnectionRegistry for BrokenRegistry {
    fn save(&self, _conn: &Connection) -> simplenotes_registry::Result<()> {
        Err(RegistryError::LockPoisoned)
    }
    fn delete(&self, _connection_id: &str) -> simplenotes_registry::Result<()> {
        Err(RegistryError::LockPoisoned)
    }
    fn find(&self, _connection_id: &str) -> simplenotes_registry::Result<Option<Connection>> {
        Err(RegistryError::LockPoisoned)
    }
    fn find_connection_ids(&self, _user_id: UserId) -> simplenotes_registry::Result<Vec<String>> {
        Err(RegistryError::LockPoisoned)
    }
    fn find_all_connection_ids(&self) -> simplenotes_registry::Result<Vec<String>> {
        Err(RegistryError::LockPoisoned)
    }
    fn find_stale(&self, _now: i64, _cutoff: i64) -> simplenotes_registry::Result<Vec<Connection>> {
        Err(RegistryError::LockPoisoned)
    }
    fn update_heartbeat(&self, _connection_id: &str, _now: i64) -> simplenotes_registry::Result<()> {
        Err(RegistryError::LockPoisoned)
    }
    fn count(&self) -> simplenotes_registry::Result<usize> {
        Err(RegistryError::LockPoisoned)
    }
}

pub struct Harness {
    pub registry: Arc<SqliteConnectionRegistry>,
    pub gateway: Arc<RecordingGateway>,
    pub service: NotificationService,
}

/// Service over an in-memory registry and a recording gateway, with a short
/// kill grace so teardown tests stay fast.
pub fn harness() -> Harness {
    let registry = Arc::new(SqliteConnectionRegistry::in_memory().unwrap());
    let gateway = Arc::new(RecordingGateway::default());
    let config = RealtimeConfig {
        kill_grace_ms: 20,
        ..RealtimeConfig::default()
    };
    let service = NotificationService::new(registry.clone(), gateway.clone(), config);
    Harness {
        registry,
        gateway,
        service,
    }
}
