//! Bootstrap configuration and data folder resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap** (`kobu.toml`): data folder, listen address, logging.
//!    Read once at startup.
//! 2. **Database runtime settings**: evidence thresholds and similar values in
//!    the `settings` table (see [`crate::db::settings`]).
//!
//! A missing TOML file is not an error; compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the data folder
pub const DATA_FOLDER_ENV: &str = "KOBU_DATA_FOLDER";

/// Environment variable pointing at an explicit TOML file
pub const CONFIG_FILE_ENV: &str = "KOBU_CONFIG";

/// Database file name inside the data folder
pub const DATABASE_FILE: &str = "kobu.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional; see [`resolve_data_folder`])
    #[serde(default)]
    pub data_folder: Option<PathBuf>,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name printed at the foot of letters
    #[serde(default = "default_company_name")]
    pub company_name: String,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            bind_address: default_bind_address(),
            port: default_port(),
            company_name: default_company_name(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_company_name() -> String {
    "Watu Kobu".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be between 1 and 65535".to_string()));
        }
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(Error::Config(format!("Unknown log level: {}", other))),
        }
    }
}

/// Where the bootstrap configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Report the source; call once tracing is installed
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => warn!("No kobu.toml found, using compiled defaults"),
        }
    }
}

/// Load the bootstrap configuration
///
/// Lookup order for the file: `explicit` path, `KOBU_CONFIG`, then the
/// platform config locations. An explicitly named file must exist; when none
/// is found at the default locations, compiled defaults are returned.
///
/// Runs before the subscriber exists, so the outcome is returned as a
/// [`ConfigSource`] instead of being logged here.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

    let path = match named {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path
        }
        None => match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => path,
            None => return Ok((TomlConfig::default(), ConfigSource::Defaults)),
        },
    };

    let text = std::fs::read_to_string(&path)?;
    let config = TomlConfig::from_toml_str(&text)?;
    Ok((config, ConfigSource::File(path)))
}

/// Platform config file locations, most specific first
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kobu").join("kobu.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/kobu/kobu.toml"));
    }
    paths
}

/// Data folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. `KOBU_DATA_FOLDER` environment variable
/// 3. TOML `data_folder`
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(DATA_FOLDER_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    if let Some(path) = &toml.data_folder {
        return path.clone();
    }
    default_data_folder()
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("kobu"))
        .unwrap_or_else(|| PathBuf::from("./kobu_data"))
}

/// Database path inside a data folder
pub fn database_path(data_folder: &Path) -> PathBuf {
    data_folder.join(DATABASE_FILE)
}
