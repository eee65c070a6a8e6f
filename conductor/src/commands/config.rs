//! Configuration management for Conductor
//!
//! Settings come from a TOML file, then environment overrides, then
//! validation. Lookup order for the file:
//!
//! 1. an explicit path (`--config`)
//! 2. `$CONDUCTOR_CONFIG`
//! 3. `./conductor.toml`
//! 4. `<config dir>/conductor/config.toml`
//!
//! With no file found, defaults are used.

use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable naming the config file
pub const ENV_CONFIG: &str = "CONDUCTOR_CONFIG";
/// Server bind host override
pub const ENV_HOST: &str = "CONDUCTOR_HOST";
/// Server port override
pub const ENV_PORT: &str = "CONDUCTOR_PORT";
/// Default plan concurrency override
pub const ENV_MAX_CONCURRENCY: &str = "CONDUCTOR_MAX_CONCURRENCY";
/// Log level override
pub const ENV_LOG_LEVEL: &str = "CONDUCTOR_LOG_LEVEL";
/// Log format override
pub const ENV_LOG_FORMAT: &str = "CONDUCTOR_LOG_FORMAT";

const LOCAL_CONFIG_FILE: &str = "conductor.toml";

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config from {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config from {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// An environment override did not parse
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Setting the value was meant for
        key: String,
        /// Raw value
        value: String,
    },

    /// Settings that parse but contradict each other
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// HTTP listener
    pub server: ServerConfig,
    /// Plan concurrency
    pub execution: ExecutionConfig,
    /// Log level and output format
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

impl ServerConfig {
    /// `host:port` bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Plan execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Pool size for plans that do not ask for one
    pub default_max_concurrency: usize,

    /// Upper bound on any plan's pool size
    pub max_concurrency_limit: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_max_concurrency: crate::orchestration::DEFAULT_MAX_CONCURRENCY,
            max_concurrency_limit: 64,
        }
    }
}

impl ExecutionConfig {
    /// Pool size for a plan: the requested size (or the default), capped at the limit
    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_concurrency)
            .min(self.max_concurrency_limit)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text lines
    #[default]
    Human,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidValue {
                key: "logging.format".into(),
                value: s.into(),
            }),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl ConductorConfig {
    /// Load configuration using the standard lookup order and the process
    /// environment
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    /// Load configuration, reading environment variables through `env`
    pub fn load_with_env<F>(explicit: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match Self::resolve_path(explicit, &env) {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                Self::load_from_path(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.merge_env_with(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Pick the config file to read. An explicit or `$CONDUCTOR_CONFIG` path
    /// is returned whether or not it exists so that a typo is reported.
    pub fn resolve_path<F>(explicit: Option<&Path>, env: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = env(ENV_CONFIG).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }

        default_config_path().filter(|p| p.is_file())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `CONDUCTOR_*` overrides read through `env`
    pub fn merge_env_with<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = env(ENV_HOST) {
            debug!("Overriding server host from environment: {}", host);
            self.server.host = host;
        }

        if let Some(port) = env(ENV_PORT) {
            debug!("Overriding server port from environment: {}", port);
            self.server.port = parse_value(ENV_PORT, &port)?;
        }

        if let Some(concurrency) = env(ENV_MAX_CONCURRENCY) {
            debug!("Overriding default concurrency from environment: {}", concurrency);
            self.execution.default_max_concurrency = parse_value(ENV_MAX_CONCURRENCY, &concurrency)?;
        }

        if let Some(level) = env(ENV_LOG_LEVEL) {
            debug!("Overriding log level from environment: {}", level);
            self.logging.level = level;
        }

        if let Some(format) = env(ENV_LOG_FORMAT) {
            debug!("Overriding log format from environment: {}", format);
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        if self.execution.default_max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "execution.default_max_concurrency must be at least 1".into(),
            ));
        }
        if self.execution.max_concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "execution.max_concurrency_limit must be at least 1".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

/// `<config dir>/conductor/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("conductor").join("config.toml"))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
