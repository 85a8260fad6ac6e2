// ⚙️ Configuration
// .env first, then process environment

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const ENV_API_KEY: &str = "MAP4D_API_KEY";
pub const ENV_MAP_ID: &str = "MAP4D_MAP_ID";
pub const ENV_DATA_DIR: &str = "FACILITY_MAP_DATA_DIR";
pub const ENV_TEMPLATE: &str = "FACILITY_MAP_TEMPLATE";
pub const ENV_DOMAINS: &str = "FACILITY_MAP_DOMAINS";
/// Listen address of the HTTP server
pub const ENV_SERVER_ADDR: &str = "FACILITY_MAP_ADDR";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_TEMPLATE: &str = "templates/map4d_template.html";
const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";

/// Map provider credentials. Without them the map is unavailable but
/// everything else keeps working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapCredentials {
    pub api_key: String,
    pub map_id: Option<String>,
}

impl MapCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same rules as [`from_env`](Self::from_env) with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::ConfigurationMissing {
                key: ENV_API_KEY.to_string(),
            })?;

        let map_id = lookup(ENV_MAP_ID).filter(|v| !v.trim().is_empty());

        Ok(MapCredentials { api_key, map_id })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub template_path: PathBuf,

    /// JSON file of domain descriptors replacing the built-in catalog
    pub domains_file: Option<PathBuf>,

    pub server_addr: String,

    /// `None` means the map is unavailable
    pub credentials: Option<MapCredentials>,
}

impl AppConfig {
    /// Load `.env` (if any) and read the environment
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match MapCredentials::from_lookup(&lookup) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                tracing::warn!("{}; map rendering disabled", e);
                None
            }
        };

        AppConfig {
            data_dir: lookup(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            template_path: lookup(ENV_TEMPLATE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE)),
            domains_file: lookup(ENV_DOMAINS).map(PathBuf::from),
            server_addr: lookup(ENV_SERVER_ADDR)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
            credentials,
        }
    }

    pub fn map_available(&self) -> bool {
        self.credentials.is_some()
    }
}
