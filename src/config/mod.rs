use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::{duration, parse_default};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Playlist download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total time allowed for a playlist GET
    #[serde(default = "default_fetch_timeout", with = "duration")]
    pub timeout: Duration,
    #[serde(default = "default_fetch_connect_timeout", with = "duration")]
    pub connect_timeout: Duration,
    /// User-Agent sent when downloading playlist text
    #[serde(default = "default_fetch_user_agent")]
    pub user_agent: String,
}

/// Playback session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Delay before a failed attempt is re-initialized
    #[serde(default = "default_retry_delay", with = "duration")]
    pub retry_delay: Duration,
    /// User-Agent for direct (non-playlist) streams without one of their own
    #[serde(default = "default_app_user_agent")]
    pub default_user_agent: String,
    /// User-Agents rotated through for failing playlist streams
    #[serde(default = "default_user_agent_rotation")]
    pub user_agent_rotation: Vec<String>,
    #[serde(default = "default_engine_connect_timeout", with = "duration")]
    pub engine_connect_timeout: Duration,
    #[serde(default = "default_engine_read_timeout", with = "duration")]
    pub engine_read_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON document holding saved playlists and favorites
    #[serde(default = "default_library_path")]
    pub library_path: PathBuf,
}

fn default_fetch_timeout() -> Duration {
    parse_default(DEFAULT_FETCH_TIMEOUT)
}

fn default_fetch_connect_timeout() -> Duration {
    parse_default(DEFAULT_FETCH_CONNECT_TIMEOUT)
}

fn default_fetch_user_agent() -> String {
    DEFAULT_FETCH_USER_AGENT.to_string()
}

fn default_retry_delay() -> Duration {
    parse_default(DEFAULT_RETRY_DELAY)
}

fn default_app_user_agent() -> String {
    DEFAULT_APP_USER_AGENT.to_string()
}

fn default_user_agent_rotation() -> Vec<String> {
    DEFAULT_USER_AGENT_ROTATION
        .iter()
        .map(|ua| ua.to_string())
        .collect()
}

fn default_engine_connect_timeout() -> Duration {
    parse_default(DEFAULT_ENGINE_CONNECT_TIMEOUT)
}

fn default_engine_read_timeout() -> Duration {
    parse_default(DEFAULT_ENGINE_READ_TIMEOUT)
}

fn default_library_path() -> PathBuf {
    PathBuf::from(DEFAULT_LIBRARY_PATH)
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            connect_timeout: default_fetch_connect_timeout(),
            user_agent: default_fetch_user_agent(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            default_user_agent: default_app_user_agent(),
            user_agent_rotation: default_user_agent_rotation(),
            engine_connect_timeout: default_engine_connect_timeout(),
            engine_read_timeout: default_engine_read_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            library_path: default_library_path(),
        }
    }
}

impl PlaybackConfig {
    /// Rotation entry for `index`, clamped to the last entry
    pub fn rotation_user_agent(&self, index: usize) -> &str {
        self.user_agent_rotation
            .get(index)
            .or_else(|| self.user_agent_rotation.last())
            .map(String::as_str)
            .unwrap_or(&self.default_user_agent)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("STREAMTV_CONFIG").unwrap_or_else(|_| "streamtv.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.playback.user_agent_rotation.is_empty() {
            anyhow::bail!("playback.user_agent_rotation must contain at least one entry");
        }
        Ok(())
    }
}
