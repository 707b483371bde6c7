//! Configuration management for the agent.

use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tablesync_engine::ConflictPolicy;

/// Default pause between the end of one pass and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Default per-request timeout for the remote store.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote table store
    pub remote_url: Url,
    /// Path of the local SQLite file
    pub db_path: PathBuf,
    /// Pause between pass completion and the next pass
    pub interval: Duration,
    /// Which side wins a mismatch
    pub policy: ConflictPolicy,
    /// Run one pass and exit
    pub once: bool,
    /// Timeout for each remote request
    pub request_timeout: Duration,
    /// Also push tables that exist only locally
    pub push_local_tables: bool,
}

impl Config {
    /// Create a configuration with defaults for everything but the two stores.
    pub fn new(remote_url: Url, db_path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url,
            db_path: db_path.into(),
            interval: DEFAULT_INTERVAL,
            policy: ConflictPolicy::default(),
            once: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            push_local_tables: false,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("TABLESYNC_REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;
        let remote_url = Url::parse(&raw_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or(ConfigError::InvalidRemoteUrl(raw_url))?;

        let db_path = lookup("TABLESYNC_DB_PATH").unwrap_or_else(|| "tablesync.db".to_string());

        let interval = match lookup("TABLESYNC_INTERVAL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidInterval(raw)),
            },
            None => DEFAULT_INTERVAL,
        };

        let policy = match lookup("TABLESYNC_CONFLICT_POLICY") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPolicy(raw))?,
            None => ConflictPolicy::default(),
        };

        let request_timeout = match lookup("TABLESYNC_REQUEST_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let once = parse_flag(&lookup, "TABLESYNC_ONCE")?;
        let push_local_tables = parse_flag(&lookup, "TABLESYNC_PUSH_LOCAL_TABLES")?;

        Ok(Self {
            remote_url,
            db_path: PathBuf::from(db_path),
            interval,
            policy,
            once,
            request_timeout,
            push_local_tables,
        })
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(false),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TABLESYNC_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid TABLESYNC_REMOTE_URL value: {0}")]
    InvalidRemoteUrl(String),

    #[error("Invalid TABLESYNC_INTERVAL_SECS value: {0}")]
    InvalidInterval(String),

    #[error("Invalid TABLESYNC_REQUEST_TIMEOUT_SECS value: {0}")]
    InvalidTimeout(String),

    #[error("Invalid TABLESYNC_CONFLICT_POLICY value: {0}")]
    InvalidPolicy(String),

    #[error("Invalid {key} value: {value}")]
    InvalidFlag { key: &'static str, value: String },
}
