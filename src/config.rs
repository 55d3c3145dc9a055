use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  /// Custom title for header (defaults to "Animal Rescue")
  pub title: Option<String>,
  #[serde(default)]
  pub api: ApiConfig,
  /// Profile used to pre-fill the accept form when nobody is logged in
  pub volunteer: Option<VolunteerConfig>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  /// Per-request timeout for every backend call
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Upper bound for the startup health check
  #[serde(default = "default_probe_timeout_secs")]
  pub probe_timeout_secs: u64,
  /// Login at startup (password from PAWDESK_PASSWORD)
  pub username: Option<String>,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
      probe_timeout_secs: default_probe_timeout_secs(),
      username: None,
    }
  }
}

impl ApiConfig {
  pub fn probe_timeout(&self) -> Duration {
    Duration::from_secs(self.probe_timeout_secs)
  }
}

fn default_api_url() -> String {
  "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_probe_timeout_secs() -> u64 {
  5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolunteerConfig {
  pub name: String,
  pub phone: String,
  pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// SQLite file (defaults to $XDG_DATA_HOME/pawdesk/cache.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pawdesk.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pawdesk/config.yaml
  ///
  /// Without a file the defaults are used.
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
    let local = PathBuf::from("pawdesk.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pawdesk").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file parses as null
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Header title
  pub fn title(&self) -> &str {
    self.title.as_deref().unwrap_or("Animal Rescue")
  }

  /// Get the login password from the environment.
  ///
  /// Checks PAWDESK_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("PAWDESK_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set PAWDESK_PASSWORD environment variable."))
  }
}
