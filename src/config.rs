use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::fred::{FRED_URL, REQUEST_TIMEOUT_SECS};
use crate::sync::DiscoveryPacing;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub fred: FredConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Delays between remote calls during category discovery
  #[serde(default)]
  pub discovery: DiscoveryPacing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FredConfig {
  #[serde(default = "default_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for FredConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

fn default_url() -> String {
  FRED_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// SQLite file (default: $XDG_DATA_HOME/fredsync/fred.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./fredsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fredsync/config.yaml
  ///
  /// Every setting has a default, so finding no file is not an error.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("fredsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fredsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to unit, not to an empty map
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Where the cache database lives.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.cache.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("fredsync").join("fred.db"))
  }

  /// Get the FRED API key from environment variables.
  ///
  /// Checks FREDSYNC_API_KEY first, then FRED_API_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("FREDSYNC_API_KEY")
      .or_else(|_| std::env::var("FRED_API_KEY"))
      .map_err(|_| {
        eyre!("FRED API key not found. Set FREDSYNC_API_KEY or FRED_API_KEY environment variable.")
      })
  }
}
