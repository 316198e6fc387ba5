//! Configuration management
//!
//! Settings come from an optional TOML file overlaid by environment
//! variables (`QUICKSKILLS__API__BASE_URL`, `QUICKSKILLS__LOGGING__LEVEL`, ...).
//! Every field has a default, so an empty environment yields a usable config.

use ::config::{ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "QUICKSKILLS";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Backend endpoints and request defaults
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where credentials are persisted
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Prefix for relative endpoints
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Single endpoint all GraphQL operations are posted to
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Ceiling for a single backoff delay in milliseconds
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            graphql_url: default_graphql_url(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionConfig {
    /// Credential file path (empty = platform config dir)
    #[serde(default)]
    pub credentials_file: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:4000/api".to_string()
}

fn default_graphql_url() -> String {
    "http://localhost:4000/graphql".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from `explicit` or the first file found in the
    /// usual locations, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        match explicit {
            Some(path) => {
                tracing::debug!("Loading config from: {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => match Self::search_paths().into_iter().find(|p| p.exists()) {
                Some(path) => {
                    tracing::debug!("Loading config from: {}", path.display());
                    builder =
                        builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
                }
                None => tracing::debug!("No config file found, using defaults"),
            },
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document without consulting files or the environment
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        ::config::Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("quickskills.toml"),
            PathBuf::from("/etc/quickskills/config.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("quickskills").join("config.toml"));
        }
        paths
    }
}
