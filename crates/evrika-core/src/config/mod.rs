mod channels;
mod defaults;
mod providers;


pub use channels::*;
pub use providers::*;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EvrikaError;
use defaults::*;

/// Top-level Evrika configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evrika: EvrikaConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvrikaConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EvrikaConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

impl EvrikaConfig {
    /// Directory for rolling log files.
    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand(&self.data_dir)).join("logs")
    }
}

/// Storage config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Offset of the reference time zone that decides which day a usage
    /// counter belongs to.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

impl MemoryConfig {
    /// Reference time zone as a fixed offset.
    pub fn reference_offset(&self) -> Result<FixedOffset, EvrikaError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            EvrikaError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            ))
        })
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, EvrikaError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EvrikaError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| EvrikaError::Config(format!("failed to parse config: {}", e)))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Override secrets from the environment. Non-empty values win over the file.
///
/// `TELEGRAM_BOT_TOKEN`, `API_KEY` and `CATALOG_ID` are the names the bot
/// has always been deployed with.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
        config
            .channel
            .telegram
            .get_or_insert_with(TelegramConfig::default)
            .bot_token = token;
    }
    if let Some(key) = get("API_KEY") {
        config.provider.yandexgpt.api_key = key;
    }
    if let Some(catalog) = get("CATALOG_ID") {
        config.provider.yandexgpt.catalog_id = catalog;
    }
}
