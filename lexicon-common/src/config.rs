//! Configuration loading and root folder resolution

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "LEXICON_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "lexicon.db";

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_bind_address() -> String {
    "127.0.0.1:5740".to_string()
}

/// Engine and service configuration, as read from `config.toml`
///
/// Every field is optional in the file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root folder holding the database; resolved further by [`resolve_root_folder`]
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path, overriding `<root>/lexicon.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Lifetime of cached resolutions in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            bind_address: default_bind_address(),
        }
    }
}

impl EngineConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, or from the platform location
    ///
    /// A missing file is not an error: defaults are used and a warning logged.
    /// A file that exists but does not parse is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!("Config file not found: {}", path.display())));
                }
                path.to_path_buf()
            }
            None => match find_config_file() {
                Some(path) => path,
                None => {
                    warn!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Database path: explicit setting, else `<root>/lexicon.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| root_folder.join(DATABASE_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs == 0 {
            return Err(Error::Config("cache_ttl_secs must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` from the config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str, config: &EngineConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file location, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("lexicon").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/lexicon/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/lexicon (or /var/lib/lexicon for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("lexicon"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/lexicon"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("lexicon"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/lexicon"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("lexicon"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\lexicon"))
    } else {
        PathBuf::from("./lexicon_data")
    }
}
