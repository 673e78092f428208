//! Helpers for reading typed settings from a variable lookup.
//!
//! Binaries pass `|name| std::env::var(name).ok()`; tests pass a map.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A configuration variable that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(var: &'static str, reason: impl Into<String>) -> Self {
        Self {
            var,
            reason: reason.into(),
        }
    }
}

/// Parse `var` if set, else return `default`.
pub fn parse_or<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::new(var, e.to_string())),
        None => Ok(default),
    }
}

/// A positive duration given in milliseconds.
pub fn millis_or<F>(
    lookup: &F,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let millis: u64 = parse_or(lookup, var, default.as_millis() as u64)?;
    if millis == 0 {
        return Err(ConfigError::new(var, "must be greater than zero"));
    }
    Ok(Duration::from_millis(millis))
}

/// A boolean flag (`1/true/yes/on`, `0/false/no/off`).
pub fn flag_or<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(var) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::new(var, format!("expected a boolean, got `{other}`"))),
    }
}
