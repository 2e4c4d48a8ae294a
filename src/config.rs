//! Configuration loader for the `evapcool-monitor` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Everything else receives a `Config` and never
//! calls `env::var` itself.
//!
use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::orchestrator::OrchestratorConfig;
use crate::watchdog::WatchdogConfig;

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable (`1|true|yes` / `0|false|no`).
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        match env::var($var_name).ok().as_deref() {
            None => $default,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(anyhow!("Invalid {}: {}", $var_name, other)),
        }
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// One week; the log lives in memory.
const MAX_LOG_RETENTION_MINS: u64 = 7 * 24 * 60;

/// `STORE_URL` value selecting the in-process store.
pub const MEMORY_STORE_URL: &str = "memory://";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Base URL of the telemetry tree, or `memory://`.
    pub store_url: String,

    /// Optional store auth token.
    pub store_auth: Option<String>,

    /// HTTP listen port.
    pub http_port: u16,

    /// REST subscription poll period.
    pub poll_interval: Duration,

    /// Per-request timeout for store calls.
    pub write_timeout: Duration,

    pub heartbeat_timeout: Duration,
    pub check_interval: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,

    /// Telemetry log retention window.
    pub log_retention_mins: u64,

    /// Write the reference test snapshot to the store on startup.
    pub seed_test_data: bool,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `STORE_URL` – telemetry tree base URL, or `memory://`
///
/// Optional:
/// - `STORE_AUTH` – auth token appended to store requests
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `POLL_INTERVAL_MS` – store poll period (default: 2000)
/// - `WRITE_TIMEOUT_SECS` – store request timeout (default: 10)
/// - `HEARTBEAT_TIMEOUT_SECS` – liveness threshold (default: 20)
/// - `CHECK_INTERVAL_SECS` – liveness check period (default: 20)
/// - `RECONNECT_DELAY_SECS` – delay before re-subscribing (default: 5)
/// - `MAX_RECONNECT_ATTEMPTS` – reconnect budget (default: 5)
/// - `LOG_RETENTION_MINS` – telemetry log window (default: 60)
/// - `SEED_TEST_DATA` – seed the store with test data (default: false)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let store_url = require_env!("STORE_URL");
    let store_auth = env::var("STORE_AUTH").ok().filter(|s| !s.is_empty());

    let http_port = parse_env_u64!("HTTP_PORT", 8080);
    let http_port =
        u16::try_from(http_port).map_err(|_| anyhow!("Invalid HTTP_PORT: {}", http_port))?;

    let poll_interval_ms = parse_env_u64!("POLL_INTERVAL_MS", 2000);
    let write_timeout_secs = parse_env_u64!("WRITE_TIMEOUT_SECS", 10);
    let heartbeat_timeout_secs = parse_env_u64!("HEARTBEAT_TIMEOUT_SECS", 20);
    let check_interval_secs = parse_env_u64!("CHECK_INTERVAL_SECS", 20);
    let reconnect_delay_secs = parse_env_u64!("RECONNECT_DELAY_SECS", 5);
    let max_reconnect_attempts = parse_env_u64!("MAX_RECONNECT_ATTEMPTS", 5);
    let log_retention_mins = parse_env_u64!("LOG_RETENTION_MINS", 60);
    let seed_test_data = parse_env_bool!("SEED_TEST_DATA", false);

    if poll_interval_ms == 0 || check_interval_secs == 0 {
        return Err(anyhow!(
            "POLL_INTERVAL_MS and CHECK_INTERVAL_SECS must be greater than zero"
        ));
    }
    if log_retention_mins > MAX_LOG_RETENTION_MINS {
        return Err(anyhow!(
            "Invalid LOG_RETENTION_MINS: {} (max {})",
            log_retention_mins,
            MAX_LOG_RETENTION_MINS
        ));
    }

    Ok(Config {
        store_url,
        store_auth,
        http_port,
        poll_interval: Duration::from_millis(poll_interval_ms),
        write_timeout: Duration::from_secs(write_timeout_secs),
        heartbeat_timeout: Duration::from_secs(heartbeat_timeout_secs),
        check_interval: Duration::from_secs(check_interval_secs),
        reconnect_delay: Duration::from_secs(reconnect_delay_secs),
        max_reconnect_attempts: u32::try_from(max_reconnect_attempts)
            .map_err(|_| anyhow!("Invalid MAX_RECONNECT_ATTEMPTS: {}", max_reconnect_attempts))?,
        log_retention_mins,
        seed_test_data,
    })
}

impl Config {
    pub fn uses_memory_store(&self) -> bool {
        self.store_url == MEMORY_STORE_URL
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        // ---
        OrchestratorConfig {
            watchdog: WatchdogConfig {
                heartbeat_timeout: self.heartbeat_timeout,
                check_interval: self.check_interval,
                reconnect_delay: self.reconnect_delay,
                max_reconnect_attempts: self.max_reconnect_attempts,
            },
            log_retention: chrono::Duration::minutes(self.log_retention_mins as i64),
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// The store auth token is masked.
    pub fn log_config(&self) {
        // ---
        let masked_auth = if self.store_auth.is_some() { "****" } else { "(none)" };

        tracing::info!("Configuration loaded:");
        tracing::info!("  STORE_URL              : {}", self.store_url);
        tracing::info!("  STORE_AUTH             : {}", masked_auth);
        tracing::info!("  HTTP_PORT              : {}", self.http_port);
        tracing::info!("  POLL_INTERVAL_MS       : {}", self.poll_interval.as_millis());
        tracing::info!("  WRITE_TIMEOUT_SECS     : {}", self.write_timeout.as_secs());
        tracing::info!("  HEARTBEAT_TIMEOUT_SECS : {}", self.heartbeat_timeout.as_secs());
        tracing::info!("  CHECK_INTERVAL_SECS    : {}", self.check_interval.as_secs());
        tracing::info!("  RECONNECT_DELAY_SECS   : {}", self.reconnect_delay.as_secs());
        tracing::info!("  MAX_RECONNECT_ATTEMPTS : {}", self.max_reconnect_attempts);
        tracing::info!("  LOG_RETENTION_MINS     : {}", self.log_retention_mins);
        tracing::info!("  SEED_TEST_DATA         : {}", self.seed_test_data);
    }
}
