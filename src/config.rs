//! Application-level configuration, loaded from the environment at startup.

use std::{env, time::Duration};

use tracing::{info, warn};

/// How often the peer discovery loop refreshes the instance list.
const DEFAULT_PEER_REFRESH_SECS: u64 = 30;
/// How often the reaper scans for expired disconnect markers.
const DEFAULT_REAPER_INTERVAL_SECS: u64 = 15;
/// How long a disconnected participant may stay away before being removed.
const DEFAULT_DISCONNECT_GRACE_SECS: u64 = 60;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Deployment environment name, used for log context and alerts.
    pub env_name: String,
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Load-balancer health endpoint listing healthy instance addresses.
    pub peer_health_url: Option<String>,
    /// This instance's own address, excluded from the peer list.
    pub self_addr: Option<String>,
    /// Interval between peer list refreshes.
    pub peer_refresh: Duration,
    /// Interval between reaper scans.
    pub reaper_interval: Duration,
    /// Grace period before a disconnected participant is removed from its room.
    pub disconnect_grace: Duration,
    /// Webhook receiving operational alerts. Alerts are skipped when unset.
    pub alert_webhook_url: Option<String>,
    /// Points ledger endpoint credited after each round. Skipped when unset.
    pub points_ledger_url: Option<String>,
    /// Prefix for per-room voice channel names.
    pub voice_channel_prefix: String,
}

impl AppConfig {
    /// Read the configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let env_name = env::var("APP_ENV").unwrap_or_else(|_| "local".to_owned());
        let port = env_parsed("PORT", DEFAULT_PORT);

        let peer_health_url = env_opt("PEER_HEALTH_URL");
        let self_addr = env_opt("SELF_ADDR");
        if peer_health_url.is_some() && self_addr.is_none() {
            warn!("PEER_HEALTH_URL is set without SELF_ADDR; relays may loop back");
        }

        let config = Self {
            env_name,
            port,
            peer_health_url,
            self_addr,
            peer_refresh: Duration::from_secs(env_parsed(
                "PEER_REFRESH_SECS",
                DEFAULT_PEER_REFRESH_SECS,
            )),
            reaper_interval: Duration::from_secs(env_parsed(
                "REAPER_INTERVAL_SECS",
                DEFAULT_REAPER_INTERVAL_SECS,
            )),
            disconnect_grace: Duration::from_secs(env_parsed(
                "DISCONNECT_GRACE_SECS",
                DEFAULT_DISCONNECT_GRACE_SECS,
            )),
            alert_webhook_url: env_opt("ALERT_WEBHOOK_URL"),
            points_ledger_url: env_opt("POINTS_LEDGER_URL"),
            voice_channel_prefix: env::var("VOICE_CHANNEL_PREFIX")
                .unwrap_or_else(|_| "room".to_owned()),
        };

        info!(
            env = %config.env_name,
            port = config.port,
            peers = config.peer_health_url.is_some(),
            "loaded configuration"
        );
        config
    }
}

fn env_opt(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr + Copy>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(var, raw, "unparseable value; using default");
                default
            }
        },
        Err(_) => default,
    }
}
