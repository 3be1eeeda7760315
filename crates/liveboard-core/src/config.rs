use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3030;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEMO_TICK_MS: u64 = 1_500; // synthetic event cadence
pub const RECONNECT_DELAY_MS: u64 = 3_000; // flat, never grows
pub const TOP_K: usize = 10;
pub const LEADING_GIFT_STALE_SECS: u64 = 30;
pub const KEEP_ALIVE_SECS: u64 = 15;
pub const REQUEST_POLLING_INTERVAL_MS: u64 = 2_000;

/// Top-level config (liveboard.toml + LIVEBOARD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveboardConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
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

/// Options forwarded to the live-session relay on every connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the webcast relay. Live mode is unavailable when unset.
    pub relay_url: Option<String>,
    #[serde(default = "bool_true")]
    pub process_initial_data: bool,
    #[serde(default = "bool_true")]
    pub enable_extended_gift_info: bool,
    #[serde(default = "bool_true")]
    pub enable_websocket_upgrade: bool,
    #[serde(default = "default_polling_interval")]
    pub request_polling_interval_ms: u64,
    /// Optional upstream session cookie, passed through untouched.
    pub session_id: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            process_initial_data: true,
            enable_extended_gift_info: true,
            enable_websocket_upgrade: true,
            request_polling_interval_ms: REQUEST_POLLING_INTERVAL_MS,
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEMO_TICK_MS,
        }
    }
}

/// Subscriber-side settings used by `liveboard-gateway watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            reconnect_delay_ms: RECONNECT_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_stale_secs")]
    pub leading_gift_stale_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            top_k: TOP_K,
            leading_gift_stale_secs: LEADING_GIFT_STALE_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_polling_interval() -> u64 {
    REQUEST_POLLING_INTERVAL_MS
}
fn default_tick_ms() -> u64 {
    DEMO_TICK_MS
}
fn default_server_url() -> String {
    format!("http://{}:{}", DEFAULT_BIND, DEFAULT_PORT)
}
fn default_reconnect_delay() -> u64 {
    RECONNECT_DELAY_MS
}
fn default_top_k() -> usize {
    TOP_K
}
fn default_stale_secs() -> u64 {
    LEADING_GIFT_STALE_SECS
}

impl LiveboardConfig {
    /// Load config from a TOML file with LIVEBOARD_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.liveboard/liveboard.toml
    ///
    /// Nested keys use a double underscore in env vars, e.g.
    /// `LIVEBOARD_UPSTREAM__RELAY_URL`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        let config: Self = Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::LiveboardError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or spin the timers.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.demo.tick_ms == 0 {
            return Err(crate::error::LiveboardError::Config(
                "demo.tick_ms must be greater than 0".to_string(),
            ));
        }
        if self.client.reconnect_delay_ms == 0 {
            return Err(crate::error::LiveboardError::Config(
                "client.reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn figment(path: &str) -> Figment {
        Figment::from(Serialized::defaults(LiveboardConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("LIVEBOARD_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.liveboard/liveboard.toml", home)
}
