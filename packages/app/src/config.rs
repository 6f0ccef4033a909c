//! Runtime configuration.
//!
//! Values come from environment variables, optionally overlaid on a TOML
//! file named by `MOZZI_CONFIG`. Environment variables win over the
//! file; the file wins over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Default interval between change polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default lock period after a report.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// How accumulator increments reach the store.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncrementMode {
    /// Read-modify-write from the client's current snapshot.
    #[default]
    Client,
    /// Atomic increment performed by the store.
    Server,
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FileConfig`].
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment variable has a value that cannot be used.
    #[error("Invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// A required value is missing.
    #[error("{0} is not set")]
    Missing(&'static str),
}

/// Contents of the optional TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Project root URL.
    pub supabase_url: Option<String>,
    /// Anonymous API key.
    pub supabase_anon_key: Option<String>,
    /// Kakao REST API key.
    pub kakao_rest_api_key: Option<String>,
    /// Change poll interval in seconds.
    pub poll_interval_secs: Option<u64>,
    /// Rating cooldown in milliseconds.
    pub cooldown_ms: Option<u64>,
    /// Increment mode.
    pub increment_mode: Option<IncrementMode>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Project root URL of the hosted store and auth service.
    pub supabase_url: Option<String>,
    /// Anonymous API key.
    pub supabase_anon_key: Option<String>,
    /// Kakao REST API key; Kakao geocoding is skipped without it.
    pub kakao_api_key: Option<String>,
    /// How often the change feed polls the store.
    pub poll_interval: Duration,
    /// How long a (location, dimension) stays locked after a report.
    pub cooldown: Duration,
    /// How accumulator increments reach the store.
    pub increment_mode: IncrementMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            kakao_api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cooldown: DEFAULT_COOLDOWN,
            increment_mode: IncrementMode::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, reading the file
    /// named by `MOZZI_CONFIG` first if it is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`Config::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = lookup("MOZZI_CONFIG").filter(|p| !p.is_empty()) {
            log::debug!("Reading config file {path}");
            config.apply_file(FileConfig::read(Path::new(&path))?);
        }

        config.apply_env(&lookup)?;
        Ok(config)
    }

    /// Overlays every value present in `file`.
    pub fn apply_file(&mut self, file: FileConfig) {
        if file.supabase_url.is_some() {
            self.supabase_url = file.supabase_url;
        }
        if file.supabase_anon_key.is_some() {
            self.supabase_anon_key = file.supabase_anon_key;
        }
        if file.kakao_rest_api_key.is_some() {
            self.kakao_api_key = file.kakao_rest_api_key;
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.cooldown_ms {
            self.cooldown = Duration::from_millis(ms);
        }
        if let Some(mode) = file.increment_mode {
            self.increment_mode = mode;
        }
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("SUPABASE_URL") {
            self.supabase_url = Some(url);
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(key);
        }
        if let Some(key) = get("KAKAO_REST_API_KEY") {
            self.kakao_api_key = Some(key);
        }
        if let Some(value) = get("MOZZI_POLL_INTERVAL_SECS") {
            self.poll_interval = Duration::from_secs(parse_u64("MOZZI_POLL_INTERVAL_SECS", value)?);
        }
        if let Some(value) = get("MOZZI_COOLDOWN_MS") {
            self.cooldown = Duration::from_millis(parse_u64("MOZZI_COOLDOWN_MS", value)?);
        }
        if let Some(value) = get("MOZZI_INCREMENT_MODE") {
            self.increment_mode = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MOZZI_INCREMENT_MODE",
                value,
            })?;
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "MOZZI_POLL_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the project URL and anon key, which every hosted
    /// connection needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first absent value.
    pub fn hosted(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .supabase_url
            .as_deref()
            .ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let key = self
            .supabase_anon_key
            .as_deref()
            .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        Ok((url, key))
    }
}

impl FileConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}

fn parse_u64(var: &'static str, value: String) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value })
}
