//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Эврика".to_string()
}

pub fn default_data_dir() -> String {
    "~/.evrika".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_provider() -> String {
    "yandexgpt".to_string()
}

pub fn default_enabled() -> bool {
    true
}

pub fn default_send_timeout() -> u64 {
    30
}

pub fn default_yandexgpt_model() -> String {
    "yandexgpt/rc".to_string()
}

pub fn default_yandexgpt_base_url() -> String {
    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion".to_string()
}

pub fn default_provider_timeout() -> u64 {
    60
}

pub fn default_db_path() -> String {
    "~/.evrika/data/evrika.db".to_string()
}

/// Moscow time. No DST since 2014, so a fixed offset is exact.
pub fn default_utc_offset_hours() -> i32 {
    3
}
