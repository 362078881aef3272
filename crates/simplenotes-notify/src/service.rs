use std::sync::Arc;

use futures_util::future::join_all;
use simplenotes_core::config::RealtimeConfig;
use simplenotes_core::{now_millis, UserId};
use simplenotes_protocol::{
    ConnectionKill, EventType, InboundMessage, KillCode, NoteDeleted, NoteSnapshot, SocketEvent,
    UserSnapshot,
};
use simplenotes_push::PushGateway;
use simplenotes_registry::{Connection, ConnectionRegistry};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// Outcome of one fan-out. Purely informational; nothing is retried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fanout {
    pub attempted: usize,
    pub delivered: usize,
}

impl Fanout {
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}

/// Registers channels, routes pings, and fans domain events out to them.
///
/// Holds no connection state of its own: every lookup goes to the
/// registry, so clones of the service (one per handler, one in the reaper,
/// one per detached task) all agree.
#[derive(Clone)]
pub struct NotificationService {
    registry: Arc<dyn ConnectionRegistry>,
    gateway: Arc<dyn PushGateway>,
    config: RealtimeConfig,
}

impl NotificationService {
    pub fn new(
        registry: Arc<dyn ConnectionRegistry>,
        gateway: Arc<dyn PushGateway>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            config,
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn ConnectionRegistry> {
        &self.registry
    }

    // --- channel lifecycle -------------------------------------------------

    /// Track a channel that just completed its authenticated handshake.
    ///
    /// `token_expiry_secs` is the token's `exp` claim; the channel's hard
    /// expiry is that instant in milliseconds. This is the one call that
    /// reports persistence failure to the caller.
    pub fn register_connection(
        &self,
        user_id: UserId,
        connection_id: &str,
        token_expiry_secs: i64,
    ) -> Result<()> {
        let conn = Connection::new(
            connection_id,
            user_id,
            token_expiry_secs.saturating_mul(1000),
            now_millis(),
        );
        if let Err(e) = self.registry.save(&conn) {
            error!(conn_id = %connection_id, %user_id, error = %e, "failed to save connection");
            return Err(e.into());
        }
        info!(conn_id = %connection_id, %user_id, expires_at = conn.expires_at, "connection registered");
        Ok(())
    }

    /// Forget a channel the client already closed. Never fails: there is
    /// no one left to report to.
    pub fn remove_connection(&self, connection_id: &str) {
        match self.registry.delete(connection_id) {
            Ok(()) => debug!(conn_id = %connection_id, "connection removed"),
            Err(e) => warn!(conn_id = %connection_id, error = %e, "failed to remove connection"),
        }
    }

    /// Route one client message. Only `PING` means anything; other tags,
    /// known or not, are ignored.
    pub fn handle_message(&self, message: &InboundMessage, connection_id: &str) {
        match message.kind() {
            Some(EventType::Ping) => {
                self.handle_ping(connection_id);
            }
            _ => debug!(
                conn_id = %connection_id,
                message_type = %message.message_type,
                "ignoring client message"
            ),
        }
    }

    /// Refresh the heartbeat, then acknowledge on a detached task.
    ///
    /// Returns the ack task, or `None` when the heartbeat could not be
    /// recorded (no ack is sent in that case).
    pub fn handle_ping(&self, connection_id: &str) -> Option<JoinHandle<()>> {
        if let Err(e) = self.registry.update_heartbeat(connection_id, now_millis()) {
            error!(conn_id = %connection_id, error = %e, "failed to update heartbeat");
            return None;
        }

        let svc = self.clone();
        let conn_id = connection_id.to_string();
        Some(tokio::spawn(async move {
            svc.dispatch_to_connection(&conn_id, &SocketEvent::Ack).await;
        }))
    }

    // --- delivery ----------------------------------------------------------

    /// Post a pre-serialized payload to every channel of `user_id`.
    ///
    /// Posts run concurrently; a failed or slow channel does not hold up
    /// the others.
    pub async fn push_to_user(&self, user_id: UserId, payload: &str) -> Fanout {
        let ids = match self.registry.find_connection_ids(user_id) {
            Ok(ids) => ids,
            Err(e) => {
                error!(%user_id, error = %e, "failed to fetch connections for user");
                return Fanout::default();
            }
        };
        self.post_all(&ids, payload).await
    }

    /// Wrap `event` in an envelope and push it to every channel of `user_id`.
    pub async fn dispatch(&self, user_id: UserId, event: &SocketEvent) -> Fanout {
        match encode(event) {
            Some(payload) => self.push_to_user(user_id, &payload).await,
            None => Fanout::default(),
        }
    }

    /// Wrap `event` in an envelope and post it to a single channel.
    pub async fn dispatch_to_connection(&self, connection_id: &str, event: &SocketEvent) -> bool {
        match encode(event) {
            Some(payload) => self.post(connection_id, &payload).await,
            None => false,
        }
    }

    /// Post `event` to every registered channel, whoever owns it.
    pub async fn broadcast(&self, event: &SocketEvent) -> Fanout {
        let ids = match self.registry.find_all_connection_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "failed to fetch all connections for broadcast");
                return Fanout::default();
            }
        };
        let Some(payload) = encode(event) else {
            return Fanout::default();
        };
        let fanout = self.post_all(&ids, &payload).await;
        debug!(
            event = %event.event_type(),
            attempted = fanout.attempted,
            delivered = fanout.delivered,
            "broadcast complete"
        );
        fanout
    }

    /// Force every channel of `user_id` closed.
    ///
    /// Each channel first receives a `CONNECTION_KILL` carrying `kill`, so
    /// the client can close on its own terms. Then, per channel, a detached
    /// task waits out the kill grace and removes the channel at the gateway
    /// and in the registry. Teardowns are independent of each other and of
    /// the caller; the returned handles may be awaited or dropped.
    pub async fn terminate_user_connections(
        &self,
        user_id: UserId,
        kill: ConnectionKill,
    ) -> Vec<JoinHandle<()>> {
        let ids = match self.registry.find_connection_ids(user_id) {
            Ok(ids) => ids,
            Err(e) => {
                error!(%user_id, error = %e, "failed to fetch connections to terminate");
                return Vec::new();
            }
        };
        if ids.is_empty() {
            return Vec::new();
        }

        info!(%user_id, code = ?kill.code, count = ids.len(), "terminating user connections");
        if let Some(payload) = encode(&SocketEvent::ConnectionKill(kill)) {
            self.post_all(&ids, &payload).await;
        }

        ids.into_iter()
            .map(|id| self.schedule_teardown(id))
            .collect()
    }

    /// Notify, cut, and forget one channel. The three steps run regardless
    /// of each other's outcome.
    pub async fn reclaim(&self, connection_id: &str, event: &SocketEvent) {
        self.dispatch_to_connection(connection_id, event).await;
        self.teardown(connection_id).await;
    }

    // --- detached entry points --------------------------------------------
    //
    // Called after a mutating request has already answered its client. The
    // spawned task is not tied to the request, so a client hanging up cannot
    // cancel the fan-out.

    pub fn spawn_dispatch(&self, user_id: UserId, event: SocketEvent) -> JoinHandle<Fanout> {
        let svc = self.clone();
        tokio::spawn(async move { svc.dispatch(user_id, &event).await })
    }

    pub fn spawn_broadcast(&self, event: SocketEvent) -> JoinHandle<Fanout> {
        let svc = self.clone();
        tokio::spawn(async move { svc.broadcast(&event).await })
    }

    pub fn spawn_terminate(&self, user_id: UserId, kill: ConnectionKill) -> JoinHandle<()> {
        let svc = self.clone();
        tokio::spawn(async move {
            let teardowns = svc.terminate_user_connections(user_id, kill).await;
            join_all(teardowns).await;
        })
    }

    // --- domain triggers ---------------------------------------------------

    pub fn notify_note_created(&self, note: NoteSnapshot) -> JoinHandle<Fanout> {
        self.spawn_broadcast(SocketEvent::NoteCreated(note))
    }

    pub fn notify_note_updated(&self, note: NoteSnapshot) -> JoinHandle<Fanout> {
        self.spawn_broadcast(SocketEvent::NoteUpdated(note))
    }

    pub fn notify_note_deleted(&self, note_id: i64) -> JoinHandle<Fanout> {
        self.spawn_broadcast(SocketEvent::NoteDeleted(NoteDeleted { id: note_id }))
    }

    /// Push the updated profile to the user's own channels; a suspension
    /// additionally kicks every one of them.
    pub fn notify_user_updated(&self, user: UserSnapshot) -> JoinHandle<()> {
        let svc = self.clone();
        tokio::spawn(async move {
            let user_id = UserId(user.id);
            let suspended = user.is_suspended();
            svc.dispatch(user_id, &SocketEvent::UserUpdated(user)).await;
            if suspended {
                let teardowns = svc
                    .terminate_user_connections(
                        user_id,
                        ConnectionKill::new(KillCode::SuspendedAccount),
                    )
                    .await;
                join_all(teardowns).await;
            }
        })
    }

    pub fn notify_logout(&self, user_id: UserId) -> JoinHandle<()> {
        self.spawn_terminate(user_id, ConnectionKill::new(KillCode::Logout))
    }

    /// A deleted account loses every channel. Clients treat it like a
    /// logout; the reason tells them the account is gone.
    pub fn notify_user_deleted(&self, user_id: UserId) -> JoinHandle<()> {
        self.spawn_terminate(
            user_id,
            ConnectionKill::new(KillCode::Logout).with_reason("account deleted"),
        )
    }

    // --- private helpers ---------------------------------------------------

    async fn post(&self, connection_id: &str, payload: &str) -> bool {
        match self.gateway.post_to_connection(connection_id, payload).await {
            Ok(()) => true,
            Err(e) => {
                debug!(conn_id = %connection_id, error = %e, "post dropped");
                false
            }
        }
    }

    async fn post_all(&self, ids: &[String], payload: &str) -> Fanout {
        let results = join_all(ids.iter().map(|id| self.post(id, payload))).await;
        Fanout {
            attempted: results.len(),
            delivered: results.into_iter().filter(|ok| *ok).count(),
        }
    }

    async fn teardown(&self, connection_id: &str) {
        if let Err(e) = self.gateway.delete_connection(connection_id).await {
            debug!(conn_id = %connection_id, error = %e, "gateway delete failed");
        }
        self.remove_connection(connection_id);
    }

    fn schedule_teardown(&self, connection_id: String) -> JoinHandle<()> {
        let svc = self.clone();
        let grace = self.config.kill_grace();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            svc.teardown(&connection_id).await;
        })
    }
}

fn encode(event: &SocketEvent) -> Option<String> {
    match event.to_envelope() {
        Ok(payload) => Some(payload),
        Err(e) => {
            error!(event = %event.event_type(), error = %e, "failed to encode envelope");
            None
        }
    }
}
