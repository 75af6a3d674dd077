//! Runtime configuration.
//!
//! Everything comes from CLI flags with environment fallbacks (see
//! [`crate::cli::Cli`]) and is validated once here, before any command runs.

use crate::classifier::{DEFAULT_API_BASE, DEFAULT_MODEL, GeminiSettings};
use chrono::FixedOffset;
use slime_core::storage::{FileStore, KeyValueStore, RedbStore};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Secondary environment variable consulted for the API key.
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

/// Store handle shared by the CLI and the server.
pub type DynStore = Box<dyn KeyValueStore + Send>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown backend '{0}' (expected 'file' or 'redb')")]
    UnknownBackend(String),

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("rate limit must be at least one request per second")]
    ZeroRateLimit,
}

// =============================================================================
// BACKEND
// =============================================================================

/// Where progression state and messages live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// A directory with one JSON file per key.
    File,
    /// A single redb database file.
    Redb,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::File => "file",
            Backend::Redb => "redb",
        })
    }
}

/// Open the store at `path` for `backend`, creating it if needed.
pub fn open_store(path: &Path, backend: Backend) -> slime_core::Result<DynStore> {
    let store: DynStore = match backend {
        Backend::File => Box::new(FileStore::open(path)?),
        Backend::Redb => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Box::new(RedbStore::open(path)?)
        }
    };
    Ok(store)
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data: PathBuf,
    pub backend: Backend,
    pub classifier: GeminiSettings,
}

impl AppConfig {
    pub fn new(
        data: PathBuf,
        backend: &str,
        api_key: Option<String>,
        model: Option<String>,
        api_base: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let api_key = api_key
            .or_else(|| std::env::var(GEMINI_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            data,
            backend: backend.parse()?,
            classifier: GeminiSettings {
                api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_key,
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: std::net::SocketAddr,
    /// Bearer key required on every route except `/health`.
    pub server_key: Option<String>,
    pub requests_per_second: u32,
}

impl ServerConfig {
    pub fn new(
        bind: &str,
        server_key: Option<String>,
        requests_per_second: u32,
    ) -> Result<Self, ConfigError> {
        let bind = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind.to_string()))?;
        if requests_per_second == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        Ok(Self {
            bind,
            server_key: server_key.filter(|k| !k.is_empty()),
            requests_per_second,
        })
    }
}

/// The local UTC offset used for transcript timestamps.
pub fn local_offset() -> FixedOffset {
    *chrono::Local::now().offset()
}
