use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::{CacheRule, RuleTable};
use crate::http::{api_base_url, DEFAULT_AUTH_PREFIX};

/// Environment variable that overrides `api.origin`.
pub const API_URL_ENV: &str = "STOREFRONT_API_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Backend origin, e.g. `http://localhost:5000`. `/api` is appended.
  pub origin: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Endpoints under this prefix don't trigger a global logout on 401
  #[serde(default = "default_auth_prefix")]
  pub auth_path_prefix: String,
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_auth_prefix() -> String {
  DEFAULT_AUTH_PREFIX.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Replaces the built-in rule table when non-empty
  #[serde(default)]
  pub rules: Vec<RuleConfig>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      rules: Vec::new(),
    }
  }
}

fn default_true() -> bool {
  true
}

/// One cache rule. `key` may reference placeholders as `{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
  pub pattern: String,
  pub key: String,
  pub ttl_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Filter directive used when `STOREFRONT_LOG` is not set
  pub level: Option<String>,
  /// Where log files go (defaults to the data directory)
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./storefront.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/storefront/config.yaml
  ///
  /// Without a file, `STOREFRONT_API_URL` alone is enough.
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

    let env_origin = std::env::var(API_URL_ENV).ok().filter(|v| !v.trim().is_empty());

    let mut config = match (path, env_origin.as_deref()) {
      (Some(p), _) => Self::load_from_path(&p)?,
      (None, Some(origin)) => Self::with_origin(origin),
      (None, None) => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/storefront/config.yaml\n\
                 or set {}.",
          API_URL_ENV
        ))
      }
    };

    if let Some(origin) = env_origin {
      config.api.origin = origin;
    }

    Ok(config)
  }

  /// Defaults for everything but the origin.
  pub fn with_origin(origin: &str) -> Self {
    Self {
      api: ApiConfig {
        origin: origin.to_string(),
        timeout_secs: default_timeout_secs(),
        auth_path_prefix: default_auth_prefix(),
      },
      cache: CacheConfig::default(),
      log: LogConfig::default(),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("storefront.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("storefront").join("config.yaml");
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
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// `api.origin` normalized to end in `/api`.
  pub fn base_url(&self) -> Result<Url> {
    api_base_url(&self.api.origin)
      .map_err(|e| eyre!("Invalid API origin '{}': {}", self.api.origin, e))
  }

  /// Configured rules, or the storefront defaults when none are given.
  pub fn rule_table(&self) -> Result<RuleTable> {
    if self.cache.rules.is_empty() {
      return Ok(RuleTable::storefront_defaults()?);
    }

    let rules = self
      .cache
      .rules
      .iter()
      .map(|r| CacheRule::template(&r.pattern, &r.key, r.ttl_ms))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(RuleTable::new(rules))
  }

  /// Get the account password from the environment.
  ///
  /// Checks STOREFRONT_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("STOREFRONT_PASSWORD")
      .map_err(|_| eyre!("Password not found. Set STOREFRONT_PASSWORD environment variable."))
  }
}
