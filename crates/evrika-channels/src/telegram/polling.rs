//! Long-polling update loop and Channel trait implementation.

use super::types::{TgResponse, TgUpdate, TgUser};
use super::TelegramChannel;
use async_trait::async_trait;
use evrika_core::{
    account::Profile,
    error::EvrikaError,
    message::{ButtonPayload, EventKind, IncomingEvent, OutgoingMessage},
    traits::Channel,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingEvent>, EvrikaError> {
        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let allowed_users = self.config.allowed_users.clone();
        let last_update_id = self.last_update_id.clone();

        info!("Telegram channel starting long polling...");

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let last = last_update_id.lock().await;
                let offset = last.map(|id| id + 1);
                drop(last);

                let mut url = format!(
                    "{base_url}/getUpdates?timeout=30\
                     &allowed_updates=%5B%22message%22%2C%22callback_query%22%5D"
                );
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let resp = match client
                    .get(&url)
                    .timeout(Duration::from_secs(35))
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        error!("telegram poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                let body: TgResponse<Vec<TgUpdate>> = match resp.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("telegram parse error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                if !body.ok {
                    error!(
                        "telegram API error (retry in {backoff_secs}s): {}",
                        body.description.unwrap_or_default()
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = (backoff_secs * 2).min(60);
                    continue;
                }

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                let updates = body.result.unwrap_or_default();

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(event) = event_from_update(update, &allowed_users) else {
                        continue;
                    };

                    if tx.send(event).await.is_err() {
                        info!("telegram channel receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), EvrikaError> {
        let chat_id_str = message
            .reply_target
            .as_deref()
            .ok_or_else(|| EvrikaError::Delivery("no reply_target on outgoing message".into()))?;

        let chat_id: i64 = chat_id_str.parse().map_err(|e| {
            EvrikaError::Delivery(format!("invalid telegram chat_id '{chat_id_str}': {e}"))
        })?;

        self.send_text(chat_id, &message.text, &message.keyboard)
            .await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), EvrikaError> {
        self.answer_callback_query(callback_id).await
    }

    async fn stop(&self) -> Result<(), EvrikaError> {
        info!("Telegram channel stopped");
        Ok(())
    }
}

fn profile_of(user: &TgUser) -> Profile {
    Profile {
        external_id: user.id,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
        last_name: user.last_name.clone(),
    }
}

/// Turn one update into an event, or `None` when it is not for the bot:
/// unauthorized senders, group chats, and messages without text.
pub(crate) fn event_from_update(update: TgUpdate, allowed_users: &[i64]) -> Option<IncomingEvent> {
    let (sender, kind, reply_target, callback_id) = if let Some(cb) = update.callback_query {
        let data = match cb.data {
            Some(d) => d,
            None => {
                debug!("telegram: callback {} without data", cb.id);
                return None;
            }
        };
        if let Some(ref m) = cb.message {
            if m.chat.is_group() {
                debug!("telegram: ignoring group callback from chat {}", m.chat.id);
                return None;
            }
        }
        // Inline keyboards only live in private chats with the bot, so the
        // sender id doubles as the chat id when the message is gone.
        let chat_id = cb.message.as_ref().map(|m| m.chat.id).unwrap_or(cb.from.id);
        (
            profile_of(&cb.from),
            EventKind::Button(ButtonPayload::parse(&data)),
            chat_id,
            Some(cb.id),
        )
    } else if let Some(msg) = update.message {
        let user = msg.from.as_ref()?;
        // Drop group messages -- the bot only talks person-to-person.
        if msg.chat.is_group() {
            debug!("telegram: ignoring group message from chat {}", msg.chat.id);
            return None;
        }
        let text = match msg.text {
            Some(ref t) => t,
            None => {
                debug!("telegram: ignoring non-text message from {}", user.id);
                return None;
            }
        };
        (
            profile_of(user),
            EventKind::from_text(text),
            msg.chat.id,
            None,
        )
    } else {
        return None;
    };

    // Auth check.
    if !allowed_users.is_empty() && !allowed_users.contains(&sender.external_id) {
        warn!(
            "ignoring update from unauthorized user {}",
            sender.external_id
        );
        return None;
    }

    Some(IncomingEvent {
        id: Uuid::new_v4(),
        channel: "telegram".to_string(),
        sender,
        kind,
        reply_target: Some(reply_target.to_string()),
        callback_id,
        timestamp: chrono::Utc::now(),
    })
}
