use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 7070;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const HEARTBEAT_PERIOD_SECS: u64 = 60; // client ping cadence
pub const HEARTBEAT_TOLERANCE_SECS: u64 = 10; // slack on top of two missed pings
pub const REAPER_INTERVAL_SECS: u64 = 60; // sweep cadence, matches the heartbeat period
pub const KILL_GRACE_MS: u64 = 200; // poison pill -> forced teardown delay
pub const MAX_MESSAGE_BYTES: usize = 32 * 1024; // inbound client frames are tiny

/// Top-level config (simplenotes.toml + SIMPLENOTES_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimplenotesConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub node: NodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Heartbeat and reclamation timing for live push channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_heartbeat_period")]
    pub heartbeat_period_secs: u64,
    #[serde(default = "default_heartbeat_tolerance")]
    pub heartbeat_tolerance_secs: u64,
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
    /// How long a client gets to act on a CONNECTION_KILL before its channel is cut.
    #[serde(default = "default_kill_grace")]
    pub kill_grace_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_period_secs: HEARTBEAT_PERIOD_SECS,
            heartbeat_tolerance_secs: HEARTBEAT_TOLERANCE_SECS,
            reaper_interval_secs: REAPER_INTERVAL_SECS,
            kill_grace_ms: KILL_GRACE_MS,
        }
    }
}

impl RealtimeConfig {
    /// Silence allowed before a channel counts as idle: two missed
    /// heartbeats plus tolerance.
    pub fn idle_timeout_millis(&self) -> i64 {
        let secs = self
            .heartbeat_period_secs
            .saturating_mul(2)
            .saturating_add(self.heartbeat_tolerance_secs);
        i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub mode: PushMode,
    pub api_gateway: Option<ApiGatewayConfig>,
}

/// Which transport delivers envelopes to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushMode {
    /// Sockets terminate in this process (`GET /ws`).
    #[default]
    Local,
    /// Sockets terminate at AWS API Gateway; we talk to its management API.
    ApiGateway,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGatewayConfig {
    /// Management endpoint, e.g. `https://abc123.execute-api.sa-east-1.amazonaws.com/prod`.
    pub endpoint: String,
    pub region: String,
    /// Profile in ~/.aws/credentials when env credentials are absent.
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Machine id stamped into generated ids (0..=1023).
    #[serde(default)]
    pub machine_id: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_heartbeat_period() -> u64 {
    HEARTBEAT_PERIOD_SECS
}
fn default_heartbeat_tolerance() -> u64 {
    HEARTBEAT_TOLERANCE_SECS
}
fn default_reaper_interval() -> u64 {
    REAPER_INTERVAL_SECS
}
fn default_kill_grace() -> u64 {
    KILL_GRACE_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.simplenotes/simplenotes.db", home)
}

impl SimplenotesConfig {
    /// Load config from a TOML file with SIMPLENOTES_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `SIMPLENOTES_REALTIME__HEARTBEAT_PERIOD_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::SimplenotesError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SIMPLENOTES_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.simplenotes/simplenotes.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_timeout_is_two_periods_plus_tolerance() {
        let cfg = RealtimeConfig::default();
        assert_eq!(cfg.idle_timeout_millis(), 130_000);
    }

    #[test]
    fn toml_overrides_defaults() {
        let cfg: SimplenotesConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [realtime]
                heartbeat_period_secs = 30

                [push]
                mode = "api-gateway"

                [push.api_gateway]
                endpoint = "https://example.execute-api.us-east-1.amazonaws.com/prod"
                region = "us-east-1"
                "#,
            ))
            .extract()
            .expect("config should parse");

        assert_eq!(cfg.realtime.heartbeat_period_secs, 30);
        assert_eq!(cfg.realtime.heartbeat_tolerance_secs, HEARTBEAT_TOLERANCE_SECS);
        assert_eq!(cfg.push.mode, PushMode::ApiGateway);
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert!(cfg.push.api_gateway.is_some());
    }

    #[test]
    fn empty_source_yields_defaults() {
        let cfg: SimplenotesConfig = Figment::new()
            .merge(Toml::string(""))
            .extract()
            .expect("defaults should apply");
        assert_eq!(cfg.realtime, RealtimeConfig::default());
        assert_eq!(cfg.push.mode, PushMode::Local);
    }
}
