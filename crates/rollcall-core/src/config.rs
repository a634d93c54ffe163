use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RollcallError};

pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";

pub const DEFAULT_WINDOW_MINUTES: i64 = 60;
/// Longest accepted look-ahead: 366 days.
pub const MAX_WINDOW_MINUTES: i64 = 366 * 24 * 60;
pub const DEFAULT_POLL_INTERVAL_SECS: i64 = 60;
pub const MIN_POLL_INTERVAL_SECS: i64 = 5; // below this cycles contend with request traffic
pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;
/// Sessions that started up to this long ago are still due, so a scheduler
/// that was down for a few minutes catches up on restart.
pub const SEED_GRACE_MINUTES: i64 = 15;

/// Top-level config (rollcall.toml + ROLLCALL_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollcallConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub seeding: SeedingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Capacity of the seed-request queue between HTTP handlers and the worker.
    #[serde(default = "default_request_queue")]
    pub request_queue: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            request_queue: default_request_queue(),
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

/// Raw `[seeding]` table as written by operators.
///
/// Numeric fields are signed on purpose: a negative or zero value must reach
/// [`SeedingConfig::validate`] instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedingConfig {
    /// Master switch for the periodic scheduler. On-demand seeding ignores it.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// How far ahead of now a session may start and still be due.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: i64,
    /// Max sessions claimed per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// Promote `scheduled` sessions to `open` while seeding them.
    #[serde(default = "bool_true")]
    pub auto_open: bool,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE as i64,
            auto_open: true,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
        }
    }
}

/// Validated scheduler parameters. Only obtainable through
/// [`SeedingConfig::validate`].
#[derive(Debug, Clone)]
pub struct SeedSettings {
    pub enabled: bool,
    pub window: chrono::Duration,
    pub grace: chrono::Duration,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub auto_open: bool,
    pub lock_timeout: Duration,
    pub statement_timeout: Duration,
}

impl SeedingConfig {
    /// Check and normalise the raw values.
    ///
    /// A window outside `1..=MAX_WINDOW_MINUTES` is rejected. Batch size,
    /// poll interval and the two timeouts are clamped to safe values instead.
    pub fn validate(&self) -> Result<SeedSettings> {
        if self.window_minutes <= 0 {
            return Err(RollcallError::Config(format!(
                "seeding.window_minutes must be positive, got {}",
                self.window_minutes
            )));
        }
        if self.window_minutes > MAX_WINDOW_MINUTES {
            return Err(RollcallError::Config(format!(
                "seeding.window_minutes must be at most {MAX_WINDOW_MINUTES}, got {}",
                self.window_minutes
            )));
        }
        let window = chrono::Duration::minutes(self.window_minutes);

        let poll_secs = if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            debug!(
                configured = self.poll_interval_secs,
                floor = MIN_POLL_INTERVAL_SECS,
                "poll interval below floor, clamping"
            );
            MIN_POLL_INTERVAL_SECS
        } else {
            self.poll_interval_secs
        };

        let batch_size = match usize::try_from(self.batch_size) {
            Ok(n) if n > 0 => n,
            _ => {
                warn!(
                    configured = self.batch_size,
                    default = DEFAULT_BATCH_SIZE,
                    "non-positive batch size, using default"
                );
                DEFAULT_BATCH_SIZE
            }
        };

        Ok(SeedSettings {
            enabled: self.enabled,
            window,
            grace: chrono::Duration::minutes(SEED_GRACE_MINUTES),
            poll_interval: Duration::from_secs(poll_secs as u64),
            batch_size,
            auto_open: self.auto_open,
            lock_timeout: Duration::from_millis(non_zero_or(
                self.lock_timeout_ms,
                DEFAULT_LOCK_TIMEOUT_MS,
            )),
            statement_timeout: Duration::from_millis(non_zero_or(
                self.statement_timeout_ms,
                DEFAULT_STATEMENT_TIMEOUT_MS,
            )),
        })
    }
}

fn non_zero_or(value: u64, fallback: u64) -> u64 {
    if value == 0 {
        fallback
    } else {
        value
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
fn default_request_queue() -> usize {
    256
}
fn default_window_minutes() -> i64 {
    DEFAULT_WINDOW_MINUTES
}
fn default_poll_interval_secs() -> i64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_batch_size() -> i64 {
    DEFAULT_BATCH_SIZE as i64
}
fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}
fn default_statement_timeout_ms() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.rollcall/rollcall.db", home)
}

impl RollcallConfig {
    /// Load config from a TOML file with ROLLCALL_* env var overrides.
    ///
    /// Path resolution: explicit argument, else `~/.rollcall/rollcall.toml`.
    /// A missing file is not an error; every field has a default. Nested
    /// env keys use a double underscore: `ROLLCALL_SEEDING__BATCH_SIZE=50`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading config");

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("ROLLCALL_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| RollcallError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.rollcall/rollcall.toml", home)
}
