use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub default: String,
    #[serde(default)]
    pub yandexgpt: YandexGptConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            yandexgpt: YandexGptConfig::default(),
        }
    }
}

/// YandexGPT foundation-models provider config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexGptConfig {
    #[serde(default)]
    pub api_key: String,
    /// Cloud folder (catalog) id, part of the model URI.
    #[serde(default)]
    pub catalog_id: String,
    #[serde(default = "default_yandexgpt_model")]
    pub model: String,
    #[serde(default = "default_yandexgpt_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for YandexGptConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            catalog_id: String::new(),
            model: default_yandexgpt_model(),
            base_url: default_yandexgpt_base_url(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl YandexGptConfig {
    /// Model URI in the form the completion endpoint expects.
    pub fn model_uri(&self) -> String {
        format!("gpt://{}/{}", self.catalog_id, self.model)
    }
}
