//! Telegram Bot API channel.
//!
//! Uses long polling via `getUpdates` for inbound messages and button presses,
//! and `sendMessage` with optional inline keyboards for replies.
//! Docs: <https://core.telegram.org/bots/api>

mod polling;
pub(crate) mod send;
pub(crate) mod types;


use evrika_core::config::TelegramConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Telegram message length limit, in bytes of UTF-8.
pub(crate) const MAX_MESSAGE_LEN: usize = 4096;

/// Telegram channel using the Bot API with long polling.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
    send_timeout: Duration,
    /// Tracks the last update_id to avoid reprocessing.
    last_update_id: Arc<Mutex<Option<i64>>>,
}

impl TelegramChannel {
    /// Create a new Telegram channel from config.
    pub fn new(config: TelegramConfig) -> Self {
        let base_url = format!("https://api.telegram.org/bot{}", config.bot_token);
        Self::with_base_url(config, base_url)
    }

    /// Create a channel that talks to a different Bot API server.
    pub fn with_base_url(config: TelegramConfig, base_url: String) -> Self {
        let send_timeout = Duration::from_secs(config.send_timeout_secs);
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            send_timeout,
            last_update_id: Arc::new(Mutex::new(None)),
        }
    }
}
