//! Configuration loading and data folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Service configuration, loaded from a TOML file.
///
/// Every field has a working default so the service starts with no config
/// file at all (zero-config startup). A file only needs to state the values
/// it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Data folder override; CLI and environment take precedence
    pub data_dir: Option<String>,
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub notify: NotifyConfig,
}

/// HTTP API bind address
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
        }
    }
}

/// Discovery and download behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Publisher page listing dataset releases
    pub publisher_url: String,
    /// File host prefix probed by the directory monitor fallback
    pub file_host_base: String,
    /// Minimum pause between any two requests to the publisher
    pub request_delay_ms: u64,
    pub http_timeout_secs: u64,
    /// Extra page fetches when a discovery pass yields no candidates
    pub discovery_retries: u32,
    /// Scheduled check cadence; 0 disables the scheduler
    pub check_interval_secs: u64,
    pub check_enabled: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            publisher_url: "https://www.kbob.admin.ch/de/oekobilanzdaten-im-baubereich"
                .to_string(),
            file_host_base:
                "https://backend.kbob.admin.ch/fileservice/sdweb-docs-prod-kbobadminch-files/files"
                    .to_string(),
            request_delay_ms: 1000,
            http_timeout_secs: 30,
            discovery_retries: 2,
            check_interval_secs: 6 * 60 * 60,
            check_enabled: true,
        }
    }
}

/// Operator notification sink
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook endpoint for staged/promoted/alert messages.
    /// `None` falls back to log-only notifications.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Load service configuration.
///
/// An explicitly given path must exist and parse. Otherwise the platform
/// default location is tried, and a missing file yields the built-in
/// defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ServiceConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return parse_config_file(path);
    }

    if let Some(path) = default_config_file() {
        if path.exists() {
            return parse_config_file(&path);
        }
    }

    Ok(ServiceConfig::default())
}

fn parse_config_file(path: &Path) -> Result<ServiceConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Default configuration file path for the platform
fn default_config_file() -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        // ~/.config/ecomat/config.toml, then /etc/ecomat/config.toml
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("ecomat").join("config.toml"))
        {
            if user_config.exists() {
                return Some(user_config);
            }
        }
        let system_config = PathBuf::from("/etc/ecomat/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        None
    } else {
        dirs::config_dir().map(|d| d.join("ecomat").join("config.toml"))
    }
}

/// Data folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. `ECOMAT_DATA_DIR` environment variable
/// 3. `data_dir` key in the config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&Path>, config: &ServiceConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("ECOMAT_DATA_DIR") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_dir {
        return PathBuf::from(path);
    }

    default_data_dir()
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/ecomat
        dirs::data_local_dir()
            .map(|d| d.join("ecomat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ecomat"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ecomat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ecomat"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ecomat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ecomat"))
    } else {
        PathBuf::from("./ecomat_data")
    }
}

/// Database file inside the data folder
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("ecomat.db")
}

/// Download cache inside the data folder
pub fn downloads_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("downloads")
}
