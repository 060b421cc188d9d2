//! # Theoriq Config
//!
//! Configuration for agents and clients talking to the Theoriq issuing
//! service: where the service lives, which key it signs tokens with, and the
//! long-lived credential exchanged for short-lived operational tokens.
//!
//! ## Loading from a JSON file
//!
//! ```no_run
//! use theoriq_config::TheoriqConfig;
//!
//! let config = TheoriqConfig::from_file("./theoriq.json")
//!     .expect("Failed to load configuration");
//! ```
//!
//! ## Loading from environment variables
//!
//! ```no_run
//! use theoriq_config::TheoriqConfig;
//!
//! // THEORIQ_BASE_URL=https://theoriq.example.com
//! // THEORIQ_AGENT_PRIVATE_KEY_FILE=/run/secrets/agent_key
//! let config = TheoriqConfig::from_env_or_file("THEORIQ")
//!     .expect("Failed to load configuration from environment");
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a Theoriq client or agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoriqConfig {
    pub base_url: String,
    /// Upper bound for one call to the issuing service, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Key the issuer signs tokens with, as "ed25519/<hex>" or PEM.
    /// Fetched from the service when absent.
    #[serde(default)]
    pub issuer_public_key: Option<String>,
    /// Hex encoded Ed25519 secret of this agent
    #[serde(default)]
    pub agent_private_key: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// How long before expiry a cached token is renewed, in seconds
    #[serde(default = "default_renew_margin_secs")]
    pub renew_margin_secs: i64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_renew_margin_secs() -> i64 {
    300
}

/// Builder for TheoriqConfig
///
/// ```
/// use theoriq_config::TheoriqConfig;
///
/// let config = TheoriqConfig::builder()
///     .base_url("https://theoriq.example.com")
///     .api_key("tq-api-key")
///     .timeout_secs(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.renew_margin_secs, 300);
/// ```
#[derive(Default, Debug)]
pub struct TheoriqConfigBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    issuer_public_key: Option<String>,
    agent_private_key: Option<String>,
    api_key: Option<String>,
    renew_margin_secs: Option<i64>,
}

impl TheoriqConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TheoriqConfig) -> Self {
        Self {
            base_url: Some(config.base_url.clone()),
            timeout_secs: Some(config.timeout_secs),
            issuer_public_key: config.issuer_public_key.clone(),
            agent_private_key: config.agent_private_key.clone(),
            api_key: config.api_key.clone(),
            renew_margin_secs: Some(config.renew_margin_secs),
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn issuer_public_key(mut self, key: impl Into<String>) -> Self {
        self.issuer_public_key = Some(key.into());
        self
    }

    pub fn agent_private_key(mut self, key: impl Into<String>) -> Self {
        self.agent_private_key = Some(key.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn renew_margin_secs(mut self, margin: i64) -> Self {
        self.renew_margin_secs = Some(margin);
        self
    }

    pub fn build(self) -> Result<TheoriqConfig, ConfigError> {
        let config = TheoriqConfig {
            base_url: self.base_url.ok_or(ConfigError::MissingBaseUrl)?,
            timeout_secs: self.timeout_secs.unwrap_or_else(default_timeout_secs),
            issuer_public_key: self.issuer_public_key,
            agent_private_key: self.agent_private_key,
            api_key: self.api_key,
            renew_margin_secs: self
                .renew_margin_secs
                .unwrap_or_else(default_renew_margin_secs),
        };

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingBaseUrl,
    InvalidBaseUrl(String),
    InvalidTimeout,
    InvalidRenewMargin,
    InvalidKey(String),
    IOError(String),
    ParseError(String),
    EnvVarError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingBaseUrl => {
                write!(f, "Base URL is required but was not provided. Please specify the URL of the Theoriq service.")
            }
            ConfigError::InvalidBaseUrl(url) => {
                write!(f, "Invalid base URL '{}'. It must start with http:// or https://.", url)
            }
            ConfigError::InvalidTimeout => {
                write!(f, "Invalid timeout. The timeout must be at least one second.")
            }
            ConfigError::InvalidRenewMargin => {
                write!(f, "Invalid renewal margin. The margin cannot be negative.")
            }
            ConfigError::InvalidKey(e) => {
                write!(f, "Invalid key: {}.", e)
            }
            ConfigError::IOError(e) => {
                write!(f, "I/O error occurred while reading configuration: {}. Please check file permissions and paths.", e)
            }
            ConfigError::ParseError(e) => {
                write!(f, "Failed to parse configuration data: {}. Please ensure the configuration format is correct.", e)
            }
            ConfigError::EnvVarError(e) => {
                write!(f, "Environment variable error: {}. Please ensure all required environment variables are set correctly.", e)
            }
        }
    }
}

impl Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(error: std::io::Error) -> Self {
        ConfigError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(error: serde_json::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for ConfigError {
    fn from(error: toml::de::Error) -> Self {
        ConfigError::ParseError(error.to_string())
    }
}

impl From<env::VarError> for ConfigError {
    fn from(error: env::VarError) -> Self {
        ConfigError::EnvVarError(error.to_string())
    }
}

fn optional_env(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reads `<name>_FILE` as a path to the value, falling back to `<name>`.
fn optional_env_or_file(name: &str) -> Result<Option<String>, ConfigError> {
    match optional_env(&format!("{}_FILE", name))? {
        Some(path) => {
            let value = fs::read_to_string(&path).map_err(|e| {
                ConfigError::IOError(format!("Failed to read {}: {}", path, e))
            })?;
            Ok(Some(value.trim().to_string()))
        }
        None => optional_env(name),
    }
}

fn parse_env<T: std::str::FromStr>(
    name: &str,
    invalid: ConfigError,
) -> Result<Option<T>, ConfigError> {
    match optional_env(name)? {
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| invalid),
        None => Ok(None),
    }
}

impl TheoriqConfig {
    pub fn builder() -> TheoriqConfigBuilder {
        TheoriqConfigBuilder::new()
    }

    pub fn to_builder(&self) -> TheoriqConfigBuilder {
        TheoriqConfigBuilder::from_config(self)
    }

    /// Loads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: TheoriqConfig = serde_json::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML configuration file.
    #[cfg(feature = "toml")]
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_content = fs::read_to_string(path)?;
        let config: TheoriqConfig = toml::from_str(&file_content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `<PREFIX>_BASE_URL`, `<PREFIX>_TIMEOUT_SECS`,
    /// `<PREFIX>_ISSUER_PUBLIC_KEY`, `<PREFIX>_AGENT_PRIVATE_KEY`,
    /// `<PREFIX>_API_KEY` and `<PREFIX>_RENEW_MARGIN_SECS`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, optional_env)
    }

    /// Like [`from_env`](Self::from_env), but each key may also be given as a
    /// file path through the same variable name suffixed with `_FILE`.
    pub fn from_env_or_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::load_env(prefix, optional_env_or_file)
    }

    fn load_env(
        prefix: &str,
        read_secret: fn(&str) -> Result<Option<String>, ConfigError>,
    ) -> Result<Self, ConfigError> {
        let base_url = env::var(format!("{}_BASE_URL", prefix))?;

        let config = TheoriqConfig {
            base_url,
            timeout_secs: parse_env(
                &format!("{}_TIMEOUT_SECS", prefix),
                ConfigError::InvalidTimeout,
            )?
            .unwrap_or_else(default_timeout_secs),
            issuer_public_key: read_secret(&format!("{}_ISSUER_PUBLIC_KEY", prefix))?,
            agent_private_key: read_secret(&format!("{}_AGENT_PRIVATE_KEY", prefix))?,
            api_key: read_secret(&format!("{}_API_KEY", prefix))?,
            renew_margin_secs: parse_env(
                &format!("{}_RENEW_MARGIN_SECS", prefix),
                ConfigError::InvalidRenewMargin,
            )?
            .unwrap_or_else(default_renew_margin_secs),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if self.renew_margin_secs < 0 {
            return Err(ConfigError::InvalidRenewMargin);
        }

        if let Some(key) = &self.issuer_public_key {
            let key = key.trim();
            let tagged = key.starts_with("ed25519/") || key.starts_with("secp256r1/");
            if !tagged && !key.contains("BEGIN PUBLIC KEY") {
                return Err(ConfigError::InvalidKey(
                    "issuer public key must be 'algorithm/hexkey' or PEM".to_string(),
                ));
            }
        }

        if let Some(key) = &self.agent_private_key {
            let key = key.trim();
            let hex = key.strip_prefix("0x").unwrap_or(key);
            if hex.len() != 64 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ConfigError::InvalidKey(
                    "agent private key must be 64 hex characters".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Joins `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(stripped) => dirs::home_dir().map(|home| home.join(stripped)),
        None => Some(Path::new(path).to_path_buf()),
    }
}

/// Looks for a configuration in the environment (prefix `THEORIQ`), then in
/// `./theoriq.json`, `~/.theoriq/config.json`, `/etc/theoriq/config.json` and
/// their TOML counterparts.
pub fn try_load_default_config() -> Option<TheoriqConfig> {
    if let Ok(config) = TheoriqConfig::from_env_or_file("THEORIQ") {
        return Some(config);
    }

    let paths = [
        "./theoriq.json",
        "~/.theoriq/config.json",
        "/etc/theoriq/config.json",
    ];

    for path in paths.iter().filter_map(|p| expand_home(p)) {
        if path.exists() {
            if let Ok(config) = TheoriqConfig::from_file(&path) {
                return Some(config);
            }
        }
    }

    #[cfg(feature = "toml")]
    {
        let toml_paths = [
            "./theoriq.toml",
            "~/.theoriq/config.toml",
            "/etc/theoriq/config.toml",
        ];

        for path in toml_paths.iter().filter_map(|p| expand_home(p)) {
            if path.exists() {
                if let Ok(config) = TheoriqConfig::from_toml(&path) {
                    return Some(config);
                }
            }
        }
    }

    None
}
