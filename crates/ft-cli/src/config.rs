//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use ft_core::{ClientPolicy, DriveConfig, SideMapping, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template written by `ft init`.
pub const TEMPLATE: &str = r#"# Flip tracker configuration.

# Kimai API token and base URL.
api_token = ""
api_host = "https://kimai.example.com"

# Activity per tracker side, indexed by orientation. Index 0 (and 9) is the
# base and is never used. Each entry is "projectId.activityId" or "" for a
# side without a task.
sides = ["", "", "", "", "", "", "", "", "", ""]

# Substring of the tracker's advertised device name.
# device_name = "Timeular"

# Per-request timeout for the Kimai API.
# request_timeout_secs = 10
"#;

/// Configuration problems detected before anything talks to the API.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api_token is not set. Please edit the config file: {}", path.display())]
    MissingToken { path: PathBuf },

    #[error("api_host is not set. Please edit the config file: {}", path.display())]
    MissingHost { path: PathBuf },

    #[error("invalid sides in {}: {source}", path.display())]
    Sides {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Kimai API token, sent as a bearer credential.
    pub api_token: String,
    /// Kimai base URL, e.g. `https://kimai.example.com`.
    pub api_host: String,
    /// `projectId.activityId` per orientation; blank for unassigned sides.
    pub sides: Vec<String>,
    /// Substring matched against discovered device names.
    pub device_name: String,
    pub request_timeout_secs: u64,
    pub start_attempts: u32,
    pub start_retry_delay_ms: u64,
    /// Entries shorter than this are deleted rather than stopped.
    pub short_session_secs: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_token", &"[REDACTED]")
            .field("api_host", &self.api_host)
            .field("sides", &self.sides)
            .field("device_name", &self.device_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("start_attempts", &self.start_attempts)
            .field("start_retry_delay_ms", &self.start_retry_delay_ms)
            .field("short_session_secs", &self.short_session_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let policy = ClientPolicy::default();
        Self {
            api_token: String::new(),
            api_host: String::new(),
            sides: Vec::new(),
            device_name: DriveConfig::default().device_name,
            request_timeout_secs: ft_kimai::DEFAULT_TIMEOUT.as_secs(),
            start_attempts: policy.start_attempts,
            start_retry_delay_ms: 1000,
            short_session_secs: policy.short_session.num_seconds(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(path) = default_config_file() {
            figment = figment.merge(Toml::file(path));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (FT_*)
        figment = figment.merge(Env::prefixed("FT_"));

        figment.extract()
    }

    /// Checks the credential and host, and parses the side mapping.
    ///
    /// `path` is the file the user should edit; it only appears in errors.
    pub fn validate(&self, path: &Path) -> Result<SideMapping, ConfigError> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::MissingToken {
                path: path.to_path_buf(),
            });
        }
        if self.api_host.trim().is_empty() {
            return Err(ConfigError::MissingHost {
                path: path.to_path_buf(),
            });
        }
        self.side_mapping(path)
    }

    /// Parses the side mapping without checking credentials.
    pub fn side_mapping(&self, path: &Path) -> Result<SideMapping, ConfigError> {
        SideMapping::parse(&self.sides).map_err(|source| ConfigError::Sides {
            path: path.to_path_buf(),
            source,
        })
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn client_policy(&self) -> ClientPolicy {
        ClientPolicy {
            start_attempts: self.start_attempts,
            start_retry_delay: Duration::from_millis(self.start_retry_delay_ms),
            short_session: chrono::Duration::seconds(self.short_session_secs),
            ..ClientPolicy::default()
        }
    }

    pub fn drive_config(&self) -> DriveConfig {
        DriveConfig {
            device_name: self.device_name.clone(),
            ..DriveConfig::default()
        }
    }
}

/// Returns the platform-specific config directory for ft.
///
/// On Linux: `~/.config/ft`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ft"))
}

/// Returns the default config file location.
pub fn default_config_file() -> Option<PathBuf> {
    dirs_config_path().map(|p| p.join("config.toml"))
}
