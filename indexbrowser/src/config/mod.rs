//! Configuration management for the index browser
//!
//! Default config location: ./indexbrowser.toml

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `[search.connections.<name>]` tables. `toml` is built with `preserve_order`,
/// so iteration follows the order the operator wrote them in.
pub type ConnectionMap = toml::Table;

/// Legacy flat key that overrides `browser.results_per_page`.
pub const LEGACY_RESULTS_PER_PAGE: &str = "search_results_per_page";

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Search backend settings, in either the legacy flat or the connections scheme
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Allowed origins. Use "*" for any origin.
    #[serde(default)]
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,indexbrowser=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SecurityConfig {
    /// When disabled every request is served as a local superuser
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub superuser: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_results_per_page")]
    pub results_per_page: usize,
    /// Eager-load backing objects for every hit
    #[serde(default)]
    pub load_all: bool,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    /// Where the host admin console is mounted
    #[serde(default = "default_admin_path")]
    pub admin_path: String,
    /// Where this browser is mounted inside the console
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// `app_label.model_name` entries the host console has pages for
    #[serde(default)]
    pub registered_models: Vec<String>,
}

fn default_results_per_page() -> usize {
    100
}

fn default_site_name() -> String {
    "admin".to_string()
}

fn default_admin_path() -> String {
    "/admin/".to_string()
}

fn default_mount_path() -> String {
    "/admin/indexbrowser/searchresult/".to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            results_per_page: default_results_per_page(),
            load_all: false,
            site_name: default_site_name(),
            admin_path: default_admin_path(),
            mount_path: default_mount_path(),
            registered_models: Vec::new(),
        }
    }
}

/// Raw search backend settings.
///
/// Either `connections` is present (current scheme) or the section is a flat
/// namespace of keys such as `search_engine` (legacy scheme). The shape is
/// resolved once by [`crate::capability::BackendProfile::detect`].
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct SearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<ConnectionMap>,
    #[serde(flatten)]
    pub settings: BTreeMap<String, toml::Value>,
}

/// Settings for the bundled in-memory backend
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BackendConfig {
    /// Connection name -> JSON fixture path
    #[serde(default)]
    pub fixtures: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Parse config from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from file path, or fall back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let mut config = Self::from_toml(&content)?;
            if let Some(base) = path.parent() {
                config.resolve_fixture_paths(base);
            }
            Ok(config)
        } else {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Fixture paths are relative to the config file
    fn resolve_fixture_paths(&mut self, base: &Path) {
        for path in self.backend.fixtures.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Results per page, honouring the legacy flat override.
    pub fn results_per_page(&self) -> Result<usize, ConfigError> {
        let per_page = match self.search.settings.get(LEGACY_RESULTS_PER_PAGE) {
            Some(toml::Value::Integer(n)) if *n > 0 => *n as usize,
            Some(other) => {
                return Err(ConfigError::InvalidSetting {
                    key: LEGACY_RESULTS_PER_PAGE.to_string(),
                    reason: format!("expected a positive integer, got {other}"),
                })
            }
            None => self.browser.results_per_page,
        };
        if per_page == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "browser.results_per_page".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(per_page)
    }
}
