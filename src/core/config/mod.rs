//! Host configuration loaded once at startup.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};


/// One Ollama backend and the models the operator wants available on it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Host {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub models: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub hosts: Vec<Host>,
    /// Show per-response timing and token counters.
    #[serde(default)]
    pub debug: bool,
    /// Side-by-side chat against up to four hosts instead of one.
    #[serde(default)]
    pub multimodel: bool,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Evict every loaded model before a multimodel chat starts.
    #[serde(default = "default_true")]
    pub unload_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            debug: false,
            multimodel: false,
            connect_timeout_secs: None,
            unload_on_start: true,
        }
    }
}

/// Errors that abort startup before any UI is shown.
#[derive(Debug)]
pub enum ConfigError {
    /// No platform config directory and no `--config` path.
    NoConfigDir,
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The file parsed but lists no hosts.
    NoHosts { path: PathBuf },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => {
                write!(f, "Could not determine a config directory; pass --config <path>")
            }
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path.display(), source)
            }
            ConfigError::NoHosts { path } => write!(
                f,
                "Config at {} must contain at least one [[hosts]] entry",
                path.display()
            ),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::NoConfigDir | ConfigError::NoHosts { .. } => None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the platform config directory when `None`.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
                Self::load_from_path(&path)
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
        if config.hosts.is_empty() {
            return Err(ConfigError::NoHosts {
                path: config_path.to_path_buf(),
            });
        }
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "ollamux", "ollamux")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}
