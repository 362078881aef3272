use futures_util::future::join_all;
use simplenotes_core::now_millis;
use simplenotes_protocol::{KillCode, SocketEvent};
use simplenotes_registry::Connection;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::service::NotificationService;

/// Why a sweep picked up a connection. Hard expiry wins when both apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Expired,
    Idle,
}

impl StaleReason {
    pub fn classify(conn: &Connection, now: i64) -> Self {
        if conn.is_expired(now) {
            StaleReason::Expired
        } else {
            StaleReason::Idle
        }
    }

    /// Last message the client sees before the channel is cut.
    pub fn message(self) -> SocketEvent {
        match self {
            StaleReason::Expired => SocketEvent::SessionExpired,
            StaleReason::Idle => SocketEvent::kill(KillCode::IdleTimeout),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub idle: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired + self.idle
    }
}

/// Periodic sweep over the registry that reclaims stale channels.
pub struct Reaper {
    service: NotificationService,
}

impl Reaper {
    pub fn new(service: NotificationService) -> Self {
        Self { service }
    }

    /// Heartbeats older than this are overdue: two missed periods plus
    /// tolerance.
    pub fn heartbeat_cutoff(&self, now: i64) -> i64 {
        now - self.service.config().idle_timeout_millis()
    }

    /// One sweep as of `now`. Registry failure aborts the sweep (logged);
    /// per-connection failures do not.
    pub async fn sweep_at(&self, now: i64) -> SweepReport {
        let cutoff = self.heartbeat_cutoff(now);
        let stale = match self.service.registry().find_stale(now, cutoff) {
            Ok(stale) => stale,
            Err(e) => {
                error!(error = %e, "failed to fetch stale connections");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport::default();
        let reclaims = stale.iter().map(|conn| {
            let reason = StaleReason::classify(conn, now);
            match reason {
                StaleReason::Expired => report.expired += 1,
                StaleReason::Idle => report.idle += 1,
            }
            debug!(conn_id = %conn.connection_id, user_id = %conn.user_id, ?reason, "reclaiming");
            let event = reason.message();
            async move {
                self.service.reclaim(&conn.connection_id, &event).await;
            }
        });
        let reclaims: Vec<_> = reclaims.collect();
        join_all(reclaims).await;

        if report.total() > 0 {
            info!(expired = report.expired, idle = report.idle, "stale connections reclaimed");
        }
        report
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(now_millis()).await
    }

    /// Sweep every `reaper_interval` until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.service.config().reaper_interval();
        info!(?period, "reaper started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reaper shutting down");
                        break;
                    }
                }
            }
        }
    }
}
