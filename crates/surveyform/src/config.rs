//! Configuration management for surveyform.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "surveyform";

/// Prefix of environment variables read into the configuration.
const ENV_PREFIX: &str = "SURVEYFORM_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SURVEYFORM_`, sections separated
///    by `__`, e.g. `SURVEYFORM_STORE__REPOSITORY`)
/// 2. TOML config file at `~/.config/surveyform/config.toml`
/// 3. `GITHUB_TOKEN`, as a fallback for `store.token`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote store configuration.
    pub store: StoreConfig,
    /// Conflict retry configuration.
    pub retry: RetryConfig,
    /// Web server configuration.
    pub server: ServerConfig,
}

/// Which store implementation holds the answer table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// A file in a GitHub repository, via the contents API.
    #[default]
    Github,
    /// An in-process table that is lost on exit.
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Github => write!(f, "github"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// An access token that never shows up in logs or serialized config.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no token was configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Credential(<unset>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store implementation.
    pub backend: StoreBackend,
    /// Repository as `owner/name`.
    pub repository: String,
    /// Branch holding the answer file.
    pub branch: String,
    /// Path of the answer file inside the repository.
    pub path: String,
    /// Base URL of the GitHub REST API.
    pub api_url: String,
    /// Access token. Never serialized.
    #[serde(skip_serializing)]
    pub token: Credential,
    /// Commit message; `{timestamp}` is replaced with the commit time.
    pub commit_message: String,
    /// Timeout for each HTTP request in seconds.
    pub timeout_secs: u64,
}

/// Retry configuration for conflicting writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts of the fetch-append-commit cycle.
    pub max_attempts: u32,
    /// Back-off unit in milliseconds; attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the form is served on.
    pub bind: SocketAddr,
    /// Page title.
    pub title: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Github,
            repository: String::new(),
            branch: "main".to_string(),
            path: "respostas.csv".to_string(),
            api_url: "https://api.github.com".to_string(),
            token: Credential::default(),
            commit_message: "Nova resposta adicionada em {timestamp}".to_string(),
            timeout_secs: 15,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            title: "Questionário de Rotina em Casa".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(Self::figment(&config_file))
    }

    /// Load `config_file` with the usual layering, requiring that it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, cannot be parsed, or holds
    /// invalid values.
    pub fn validate_file(config_file: &std::path::Path) -> Result<Self> {
        if !config_file.is_file() {
            return Err(Error::config_validation(format!(
                "configuration file {} does not exist",
                config_file.display()
            )));
        }
        Self::from_figment(Self::figment(config_file))
    }

    /// The provider stack used by [`Config::load_from`].
    #[must_use]
    pub fn figment(config_file: &std::path::Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(
                Env::raw()
                    .only(&["GITHUB_TOKEN"])
                    .map(|_| "store.token".into()),
            )
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extract and validate a configuration from a figment.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// Credentials are checked when the store is built, so commands that never
    /// touch the store work without them.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.store.branch.trim().is_empty() {
            return Err(Error::config_validation("store.branch must not be empty"));
        }

        if self.store.path.trim_matches('/').trim().is_empty() {
            return Err(Error::config_validation("store.path must not be empty"));
        }

        if reqwest::Url::parse(&self.store.api_url).is_err() {
            return Err(Error::config_validation(format!(
                "store.api_url is not a valid URL: {}",
                self.store.api_url
            )));
        }

        if self.store.timeout_secs == 0 {
            return Err(Error::config_validation(
                "store.timeout_secs must be greater than 0",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::config_validation(
                "retry.max_attempts must be at least 1",
            ));
        }

        Ok(())
    }

    /// Get the back-off unit as a Duration.
    #[must_use]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry.backoff_ms)
    }

    /// Get the HTTP request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.store.timeout_secs)
    }
}
