//! Runtime configuration.
//!
//! Everything the pipeline needs from the outside world (endpoint URL, retry
//! policy, display timeouts, store location, sheet names) lives in [`Config`].
//! A config is loaded once at process start and handed to the builders; no
//! module reads ambient global state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/records";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
const APP_DIR: &str = "distribution-records";

/// Generation-specific form fields.
///
/// A record only carries these fields when its generation has an entry here.
pub fn generation_fields() -> HashMap<u32, &'static [&'static str]> {
    HashMap::from([
        (8, &["gigantamax"] as &[&str]),
        (9, &["terastallize"] as &[&str]),
    ])
}

pub fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        dir.join(APP_DIR).join("config.toml")
    } else {
        PathBuf::from(".distribution-records.toml")
    }
}

pub fn default_store_path() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        dir.join(APP_DIR).join("records.duckdb")
    } else {
        PathBuf::from(".distribution-records").join("records.duckdb")
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub client: ClientConfig,
    pub feedback: FeedbackConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load `path` if given, else the default config file if it exists, else
    /// the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// URL submissions are POSTed to. Read calls derive their URLs from it.
    pub endpoint_url: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_seconds: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_seconds: 30.0,
        }
    }
}

impl ClientConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds.max(0.0))
    }
}

// ---------------------------------------------------------------------------
// FeedbackConfig
// ---------------------------------------------------------------------------

/// How long each feedback state stays visible. `0` keeps it until replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackConfig {
    pub pending_timeout_ms: u64,
    pub success_timeout_ms: u64,
    pub error_timeout_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            pending_timeout_ms: 0,
            success_timeout_ms: 3000,
            error_timeout_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    /// DuckDB file backing the sheets. Unset means [`default_store_path`].
    pub store_path: Option<PathBuf>,
    pub sheets: SheetNames,
    /// Acknowledge a resent `(id, timestamp)` pair without appending it again.
    pub idempotent_retries: bool,
    /// Offset applied to log-sheet timestamps.
    pub utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            store_path: None,
            sheets: SheetNames::default(),
            idempotent_retries: false,
            utc_offset_minutes: 9 * 60,
        }
    }
}

impl ServerConfig {
    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(default_store_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetNames {
    pub records: String,
    pub analytics: String,
    pub activity: String,
    pub errors: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            records: "records".to_string(),
            analytics: "json_data".to_string(),
            activity: "activity_log".to_string(),
            errors: "error_log".to_string(),
        }
    }
}
