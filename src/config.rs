//! API key resolution.
//!
//! Keys are looked up in order: a key passed to the builder, the
//! `[access] api_key` entry of the TOML file `~/.alphavantage`, then the
//! `ALPHAVANTAGE_API_KEY` environment variable. Empty values count as absent.

use crate::{Error, Result};
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

/// Name of the per-user config file in the home directory.
pub const CONFIG_FILE_NAME: &str = ".alphavantage";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    access: AccessSection,
}

#[derive(Debug, Default, Deserialize)]
struct AccessSection {
    api_key: Option<String>,
}

/// `~/.alphavantage`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
}

/// Reads the API key from a config file. A missing file or entry is `Ok(None)`.
///
/// # Errors
///
/// Returns [`Error::ConfigurationError`] if the file exists but is not valid TOML.
pub fn api_key_from_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let config: ConfigFile = Figment::from(Toml::file(path))
        .extract()
        .map_err(|e| Error::ConfigurationError(format!("{}: {}", path.display(), e)))?;

    Ok(non_empty(config.access.api_key))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Where to look for the API key, in priority order.
///
/// # Examples
///
/// ```
/// use vantage::config::ApiKeySource;
///
/// let key = ApiKeySource::default()
///     .explicit("demo")
///     .resolve()?;
/// assert_eq!(key.as_deref(), Some("demo"));
/// # Ok::<(), vantage::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeySource {
    explicit: Option<String>,
    config_path: Option<PathBuf>,
    env_var: String,
}

impl Default for ApiKeySource {
    fn default() -> Self {
        Self {
            explicit: None,
            config_path: default_config_path(),
            env_var: API_KEY_ENV.to_string(),
        }
    }
}

impl ApiKeySource {
    /// Uses this key before any other source.
    pub fn explicit(mut self, key: impl Into<String>) -> Self {
        self.explicit = Some(key.into());
        self
    }

    /// Reads the config file from this path instead of `~/.alphavantage`.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Skips the config file.
    pub fn without_config_file(mut self) -> Self {
        self.config_path = None;
        self
    }

    /// Reads the key from this environment variable instead of `ALPHAVANTAGE_API_KEY`.
    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Resolves the key. `Ok(None)` when no source has one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the config file is malformed.
    pub fn resolve(&self) -> Result<Option<String>> {
        if let Some(key) = non_empty(self.explicit.clone()) {
            return Ok(Some(key));
        }

        if let Some(path) = &self.config_path {
            if let Some(key) = api_key_from_file(path)? {
                tracing::debug!(path = %path.display(), "API key loaded from config file");
                return Ok(Some(key));
            }
        }

        Ok(non_empty(std::env::var(&self.env_var).ok()))
    }
}
