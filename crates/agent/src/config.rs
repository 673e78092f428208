use std::path::PathBuf;
use std::time::Duration;

use relaydeck_core::config::{millis_or, parse_or};
use relaydeck_core::ConfigError;
use relaydeck_worker::inventory;

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Relay endpoint, e.g. `ws://127.0.0.1:8999/`.
    pub relay_url: String,
    pub jobs_dir: PathBuf,
    pub inventory_interval: Duration,
    /// Pause between a dropped session and the next connect attempt.
    pub reconnect_delay: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:8999/".to_string(),
            jobs_dir: PathBuf::from("scripts"),
            inventory_interval: inventory::DEFAULT_INTERVAL,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                |
    /// |-------------------------|------------------------|
    /// | `RELAY_URL`             | `ws://127.0.0.1:8999/` |
    /// | `JOBS_DIR`              | `scripts`              |
    /// | `INVENTORY_INTERVAL_MS` | `1000`                 |
    /// | `RECONNECT_DELAY_SECS`  | `5`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let relay_url = lookup("RELAY_URL").unwrap_or(defaults.relay_url);
        if !(relay_url.starts_with("ws://") || relay_url.starts_with("wss://")) {
            return Err(ConfigError::new(
                "RELAY_URL",
                format!("expected a ws:// or wss:// URL, got `{relay_url}`"),
            ));
        }

        let reconnect_secs: u64 = parse_or(
            &lookup,
            "RECONNECT_DELAY_SECS",
            defaults.reconnect_delay.as_secs(),
        )?;
        if reconnect_secs == 0 {
            return Err(ConfigError::new(
                "RECONNECT_DELAY_SECS",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            relay_url,
            jobs_dir: lookup("JOBS_DIR").map(PathBuf::from).unwrap_or(defaults.jobs_dir),
            inventory_interval: millis_or(
                &lookup,
                "INVENTORY_INTERVAL_MS",
                defaults.inventory_interval,
            )?,
            reconnect_delay: Duration::from_secs(reconnect_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::from_lookup(|_: &str| -> Option<String> { None }).unwrap();
        assert_eq!(config.relay_url, "ws://127.0.0.1:8999/");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.inventory_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_non_websocket_url() {
        let err = AgentConfig::from_lookup(|name: &str| {
            (name == "RELAY_URL").then(|| "http://localhost:8999".to_string())
        })
        .unwrap_err();
        assert_eq!(err.var, "RELAY_URL");
    }

    #[test]
    fn zero_reconnect_delay_rejected() {
        let err = AgentConfig::from_lookup(|name: &str| {
            (name == "RECONNECT_DELAY_SECS").then(|| "0".to_string())
        })
        .unwrap_err();
        assert_eq!(err.var, "RECONNECT_DELAY_SECS");
    }
}
