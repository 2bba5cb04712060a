// Server configuration
//
// Process-level settings: bind address, route prefix, sweep cadence and
// notification delivery. Alerting rules live in EngineConfig.

use paperwatch_core::config::env_parse;
use paperwatch_core::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Prefix for API routes (e.g. "/api"); empty for none
    pub api_prefix: String,
    /// Origins allowed for cross-origin requests; empty disables CORS
    pub cors_origins: Vec<String>,
    pub offline_sweep_interval: Duration,
    pub stale_empty_sweep_interval: Duration,
    pub retention_sweep_interval: Duration,
    /// Webhook endpoint for notifications; log-only delivery when unset
    pub notify_webhook_url: Option<String>,
    /// Comma-separated notification recipients
    pub notify_recipients: String,
    pub notify_max_attempts: u32,
    /// JSON array of floors loaded into the location directory at startup
    pub floors_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9000)),
            api_prefix: String::new(),
            cors_origins: Vec::new(),
            offline_sweep_interval: Duration::from_secs(600),
            stale_empty_sweep_interval: Duration::from_secs(600),
            retention_sweep_interval: Duration::from_secs(86_400),
            notify_webhook_url: None,
            notify_recipients: String::new(),
            notify_max_attempts: 3,
            floors_file: None,
        }
    }
}

impl ServerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `BIND_ADDR`: listen address (default: "0.0.0.0:9000")
    /// - `API_PREFIX`: route prefix, e.g. "/api" (default: none)
    /// - `CORS_ALLOWED_ORIGINS`: comma-separated origins (default: none)
    /// - `OFFLINE_SWEEP_INTERVAL_SECS` (default: 600)
    /// - `STALE_EMPTY_SWEEP_INTERVAL_SECS` (default: 600)
    /// - `RETENTION_SWEEP_INTERVAL_SECS` (default: 86400)
    /// - `NOTIFY_WEBHOOK_URL`: webhook for notifications (default: log only)
    /// - `NOTIFY_RECIPIENTS`: comma-separated recipients
    /// - `NOTIFY_MAX_ATTEMPTS`: delivery attempts per alert (default: 3)
    /// - `FLOORS_FILE`: JSON floor list to preload (default: none)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            bind_addr: env_parse("BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            api_prefix: std::env::var("API_PREFIX").unwrap_or_default(),
            cors_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            offline_sweep_interval: secs("OFFLINE_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.offline_sweep_interval),
            stale_empty_sweep_interval: secs("STALE_EMPTY_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.stale_empty_sweep_interval),
            retention_sweep_interval: secs("RETENTION_SWEEP_INTERVAL_SECS")?
                .unwrap_or(defaults.retention_sweep_interval),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            notify_recipients: std::env::var("NOTIFY_RECIPIENTS").unwrap_or_default(),
            notify_max_attempts: env_parse::<u32>("NOTIFY_MAX_ATTEMPTS")?
                .unwrap_or(defaults.notify_max_attempts)
                .max(1),
            floors_file: std::env::var("FLOORS_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Positive interval in seconds; zero is rejected since tokio intervals panic on it
fn secs(name: &str) -> Result<Option<Duration>, ConfigError> {
    match env_parse::<u64>(name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: "0".to_string(),
        }),
        other => Ok(other.map(Duration::from_secs)),
    }
}
