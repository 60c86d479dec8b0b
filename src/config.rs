// Runtime configuration.
// Loaded from an optional TOML file; every field has a default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::default_cache_dir;
use crate::error::{FetchError, Result};
use crate::http::{DEFAULT_PARTNER_HOST, DEFAULT_TIMEOUT};

const DEFAULT_OPENDOTA_BASE_URL: &str = "https://api.opendota.com/api";

/// Settings for the shared getter and its consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache root. Falls back to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Host whose 403 responses are escalated to the developer.
    pub partner_host: String,
    pub user_agent: String,
    /// Remove transient cache entries when the getter starts.
    pub clear_transient_on_start: bool,
    pub opendota_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            partner_host: DEFAULT_PARTNER_HOST.to_string(),
            user_agent: concat!("mangofetch/", env!("CARGO_PKG_VERSION")).to_string(),
            clear_transient_on_start: false,
            opendota_base_url: DEFAULT_OPENDOTA_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolved cache root.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(default_cache_dir)
            .ok_or_else(|| FetchError::Other("could not determine a cache directory".to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
