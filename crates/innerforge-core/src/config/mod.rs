use crate::error::{ForgeError, Result};
use chrono_tz::Tz;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom path for the SQLite database. Defaults to `~/.config/innerforge/innerforge.db`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// IANA zone used for viewers without a profile zone of their own.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of a login session, in hours.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

// -- Defaults --

fn default_web_port() -> u16 {
    8000
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_timezone() -> String {
    crate::model::DEFAULT_TIMEZONE.to_string()
}
fn default_session_ttl_hours() -> u32 {
    // Two weeks.
    336
}

impl ForgeConfig {
    /// Load configuration with a two-layer TOML merge:
    /// 1. ~/.config/innerforge/config.toml (global)
    /// 2. innerforge.toml in the project directory
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Layer 1: Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        // Layer 2: Project config
        if let Some(dir) = project_dir {
            let project_config = dir.join("innerforge.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| ForgeError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| ForgeError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self {
            storage: StorageConfig::default(),
            web: WebConfig::default(),
            time: TimeConfig::default(),
            auth: AuthConfig::default(),
        }
    }

    /// Validate config values, logging warnings. Bad values are repaired
    /// rather than rejected.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.time.default_timezone.parse::<Tz>().is_err() {
            warnings.push(format!(
                "unknown timezone '{}', using {}",
                self.time.default_timezone,
                crate::model::DEFAULT_TIMEZONE
            ));
            self.time.default_timezone = default_timezone();
        }

        if self.auth.session_ttl_hours == 0 {
            warnings.push("auth.session_ttl_hours = 0, setting to 1".to_string());
            self.auth.session_ttl_hours = 1;
        }

        // Log warnings via tracing (if subscriber is set up)
        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("innerforge").join("config.toml"))
}
