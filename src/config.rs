//! Process-wide configuration, resolved once at startup from the environment.
//!
//! Every field is read with [`std::env::var`]; a required variable that is missing or
//! unparsable is a hard startup failure naming the variable, never a silently-applied
//! default for anything security-sensitive (the JWT secret has no default at all).

use std::time::Duration;
use tracing::info;

/// A startup configuration error: missing or malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Resolved process configuration.
#[derive(Clone)]
pub struct Config {
    pub store_uri: String,
    pub store_database: String,
    pub jwt_secret: String,
    pub jwt_access_ttl: Duration,
    pub jwt_refresh_ttl: Duration,
    pub http_port: u16,
    pub heartbeat_interval: Duration,
    pub ping_timeout: Duration,
    pub max_channels: usize,
    pub blocklist_deadline: Duration,
    pub log_filter: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store_uri", &self.store_uri)
            .field("store_database", &self.store_database)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_access_ttl", &self.jwt_access_ttl)
            .field("jwt_refresh_ttl", &self.jwt_refresh_ttl)
            .field("http_port", &self.http_port)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("max_channels", &self.max_channels)
            .field("blocklist_deadline", &self.blocklist_deadline)
            .field("log_filter", &self.log_filter)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment. Logs the resolved (redacted)
    /// configuration once at `info` level.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            store_uri: env_or("STORE_URI", "memory://local"),
            store_database: env_or("STORE_DATABASE", "phoenixstore"),
            jwt_secret: require_env("JWT_SECRET")?,
            jwt_access_ttl: parse_duration(&env_or("JWT_ACCESS_TTL", "15m"))?,
            jwt_refresh_ttl: parse_duration(&env_or("JWT_REFRESH_TTL", "7d"))?,
            http_port: parse_env("HTTP_PORT", 8080)?,
            heartbeat_interval: Duration::from_millis(parse_env("HEARTBEAT_INTERVAL_MS", 30_000)?),
            ping_timeout: Duration::from_millis(parse_env("PING_TIMEOUT_MS", 5_000)?),
            max_channels: parse_env("MAX_CHANNELS", 10_000)?,
            blocklist_deadline: Duration::from_millis(parse_env("BLOCKLIST_DEADLINE_MS", 1_000)?),
            log_filter: env_or("LOG_FILTER", "info"),
        };
        info!(config = ?config, "configuration resolved");
        Ok(config)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(format!("missing required environment variable {key}")))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

/// Parse a duration string of the form `Ns`, `Nm`, `Nh`, or `Nd`.
fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let (digits, unit) = raw.split_at(raw.len().saturating_sub(1));
    let n: u64 = digits
        .parse()
        .map_err(|_| ConfigError(format!("invalid duration: {raw}")))?;
    let seconds = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 60 * 60,
        "d" => n * 60 * 60 * 24,
        _ => return Err(ConfigError(format!("invalid duration unit in: {raw}"))),
    };
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7_200));
    }

    #[test]
    fn rejects_bad_duration_unit() {
        assert!(parse_duration("15x").is_err());
    }
}
