//! Message sending: text with optional inline keyboard, callback answers,
//! and command registration.

use super::types::TgInlineKeyboardMarkup;
use super::{TelegramChannel, MAX_MESSAGE_LEN};
use crate::utils::split_message;
use evrika_core::{error::EvrikaError, message::InlineButton};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Bot menu shown by Telegram clients, in menu order.
pub(crate) const BOT_COMMANDS: [(&str, &str); 5] = [
    ("start", "Начать работу с ботом"),
    ("faq", "Как со мной общаться?"),
    ("subject", "Выбрать предмет"),
    ("feedback", "Обратная связь"),
    ("help", "Список команд"),
];

/// Body of one `sendMessage` call. Plain text: answers are relayed verbatim.
pub(crate) fn message_body(
    chat_id: i64,
    text: &str,
    keyboard: &[Vec<InlineButton>],
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "chat_id": chat_id,
        "text": text,
    });
    if !keyboard.is_empty() {
        body["reply_markup"] = serde_json::json!(TgInlineKeyboardMarkup::from_rows(keyboard));
    }
    body
}

impl TelegramChannel {
    /// Send a text message to a specific chat. The keyboard, if any, rides on
    /// the last chunk.
    pub(crate) async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &[Vec<InlineButton>],
    ) -> Result<(), EvrikaError> {
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        let last = chunks.len().saturating_sub(1);
        let url = format!("{}/sendMessage", self.base_url);

        for (i, chunk) in chunks.into_iter().enumerate() {
            let body = if i == last {
                message_body(chat_id, chunk, keyboard)
            } else {
                message_body(chat_id, chunk, &[])
            };

            let resp = self
                .client
                .post(&url)
                .timeout(self.send_timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| EvrikaError::Delivery(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if status == StatusCode::FORBIDDEN {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(EvrikaError::Blocked(format!(
                    "chat {chat_id}: {error_text}"
                )));
            }
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(EvrikaError::Delivery(format!(
                    "telegram send failed ({status}): {error_text}"
                )));
            }
        }

        debug!("telegram: sent {} bytes to chat {chat_id}", text.len());
        Ok(())
    }

    /// Acknowledge a button press so the client clears its loading state.
    pub(crate) async fn answer_callback_query(&self, callback_id: &str) -> Result<(), EvrikaError> {
        let url = format!("{}/answerCallbackQuery", self.base_url);
        let body = serde_json::json!({ "callback_query_id": callback_id });

        let resp = self
            .client
            .post(&url)
            .timeout(self.send_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EvrikaError::Delivery(format!("telegram answerCallbackQuery failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(EvrikaError::Delivery(format!(
                "telegram answerCallbackQuery failed ({status}): {error_text}"
            )));
        }
        Ok(())
    }

    /// Register bot commands with Telegram so users see the menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands: Vec<serde_json::Value> = BOT_COMMANDS
            .iter()
            .map(|(command, description)| {
                serde_json::json!({ "command": command, "description": description })
            })
            .collect();
        let body = serde_json::json!({ "commands": commands });

        let url = format!("{}/setMyCommands", self.base_url);
        match self
            .client
            .post(&url)
            .timeout(self.send_timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }
}
