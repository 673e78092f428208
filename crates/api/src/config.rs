use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use relaydeck_core::config::{flag_or, millis_or, parse_or};
use relaydeck_core::ConfigError;

/// Which transport adapter the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Jobs run in this process; every socket peer is an observer.
    Embedded,
    /// Standalone relay; the scripting host connects as a peer.
    Relay,
}

impl TransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMode::Embedded => "embedded",
            TransportMode::Relay => "relay",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" => Ok(TransportMode::Embedded),
            "relay" => Ok(TransportMode::Relay),
            other => Err(format!("expected `embedded` or `relay`, got `{other}`")),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub mode: TransportMode,
    /// Bind address for both listeners.
    pub host: String,
    pub ws_port: u16,
    pub http_port: u16,
    /// Directory scanned for job scripts (embedded mode).
    pub jobs_dir: PathBuf,
    /// Directory served as the control surface.
    pub ui_dir: PathBuf,
    /// Launch the system browser after startup (embedded mode).
    pub auto_open: bool,
    pub inventory_interval: Duration,
    /// Upper bound for a single socket write before the peer is dropped.
    pub write_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Embedded,
            host: "0.0.0.0".to_string(),
            ws_port: 8999,
            http_port: 8000,
            jobs_dir: PathBuf::from("scripts"),
            ui_dir: PathBuf::from("ui"),
            auto_open: false,
            inventory_interval: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(5000),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default    |
    /// |-------------------------|------------|
    /// | `DECK_MODE`             | `embedded` |
    /// | `HOST`                  | `0.0.0.0`  |
    /// | `WS_PORT`               | `8999`     |
    /// | `HTTP_PORT`             | `8000`     |
    /// | `JOBS_DIR`              | `scripts`  |
    /// | `UI_DIR`                | `ui`       |
    /// | `AUTO_OPEN`             | `false`    |
    /// | `INVENTORY_INTERVAL_MS` | `1000`     |
    /// | `WRITE_TIMEOUT_MS`      | `5000`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            mode: parse_or(&lookup, "DECK_MODE", defaults.mode)?,
            host: lookup("HOST").unwrap_or(defaults.host),
            ws_port: parse_or(&lookup, "WS_PORT", defaults.ws_port)?,
            http_port: parse_or(&lookup, "HTTP_PORT", defaults.http_port)?,
            jobs_dir: lookup("JOBS_DIR").map(PathBuf::from).unwrap_or(defaults.jobs_dir),
            ui_dir: lookup("UI_DIR").map(PathBuf::from).unwrap_or(defaults.ui_dir),
            auto_open: flag_or(&lookup, "AUTO_OPEN", defaults.auto_open)?,
            inventory_interval: millis_or(
                &lookup,
                "INVENTORY_INTERVAL_MS",
                defaults.inventory_interval,
            )?,
            write_timeout: millis_or(&lookup, "WRITE_TIMEOUT_MS", defaults.write_timeout)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, TransportMode::Embedded);
        assert_eq!(config.ws_port, 8999);
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.jobs_dir, PathBuf::from("scripts"));
        assert!(!config.auto_open);
        assert_eq!(config.write_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DECK_MODE", "Relay"),
            ("WS_PORT", "9100"),
            ("AUTO_OPEN", "yes"),
            ("INVENTORY_INTERVAL_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.mode, TransportMode::Relay);
        assert_eq!(config.ws_port, 9100);
        assert!(config.auto_open);
        assert_eq!(config.inventory_interval, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("WS_PORT", "not-a-port")])).unwrap_err();
        assert_eq!(err.var, "WS_PORT");

        let err = ServerConfig::from_lookup(lookup(&[("DECK_MODE", "mesh")])).unwrap_err();
        assert_eq!(err.var, "DECK_MODE");

        let err = ServerConfig::from_lookup(lookup(&[("WRITE_TIMEOUT_MS", "0")])).unwrap_err();
        assert_eq!(err.var, "WRITE_TIMEOUT_MS");
    }
}
