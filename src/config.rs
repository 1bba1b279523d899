//! Configuration module - environment variable parsing
//!
//! Each service binary owns one config struct; all of them honor `LOG_LEVEL`.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::time::unix_seconds;

/// Game server configuration
#[derive(Clone, Debug)]
pub struct GameConfig {
    /// Server binding address (`GAME_ADDR`)
    pub addr: SocketAddr,
    /// Match identifier replicated in every snapshot (`MATCH_ID`)
    pub match_id: String,
    /// Regulation time (`MATCH_DURATION_SEC`)
    pub match_duration: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl GameConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: parse_addr("GAME_ADDR", "0.0.0.0:9003")?,
            match_id: env_or("MATCH_ID", &format!("local_{}", unix_seconds())),
            match_duration: Duration::from_secs(env_or_u64("MATCH_DURATION_SEC", 300)),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Server binding address (`GATEWAY_ADDR`)
    pub addr: SocketAddr,
    /// Matchmaker base URL for proxied requests (`MATCHMAKER_HTTP`)
    pub matchmaker_http: String,
    pub log_level: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: parse_addr("GATEWAY_ADDR", "0.0.0.0:9000")?,
            matchmaker_http: env_or("MATCHMAKER_HTTP", "http://localhost:9001"),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

/// Matchmaker configuration
#[derive(Clone, Debug)]
pub struct MatchmakerConfig {
    /// Server binding address (`MATCHMAKER_ADDR`)
    pub addr: SocketAddr,
    /// Game server WebSocket address handed out in assignments (`GAME_WS_ADDR`)
    pub game_ws_addr: String,
    pub log_level: String,
}

impl MatchmakerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: parse_addr("MATCHMAKER_ADDR", "0.0.0.0:9001")?,
            game_ws_addr: env_or("GAME_WS_ADDR", "ws://localhost:9003/ws"),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

/// Telemetry configuration
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Server binding address (`TELEMETRY_ADDR`)
    pub addr: SocketAddr,
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: parse_addr("TELEMETRY_ADDR", "0.0.0.0:9002")?,
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn env_or_u64(key: &str, fallback: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn parse_addr(key: &'static str, fallback: &str) -> Result<SocketAddr, ConfigError> {
    env_or(key, fallback)
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(key))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid socket address in {0}")]
    InvalidAddress(&'static str),
}
