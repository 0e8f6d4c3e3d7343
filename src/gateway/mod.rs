//! Gateway: the main event loop connecting channels, storage, and the provider.
//!
//! Events from one sender are handled strictly in arrival order; different
//! senders are handled concurrently.

mod conversation;

#[cfg(test)]
mod tests;

use crate::texts;
use conversation::{plan, Effect, Turn};
use evrika_core::{
    account::{Account, Role},
    error::EvrikaError,
    message::{Command, EventKind, IncomingEvent, OutgoingMessage},
    traits::{Channel, Provider, Storage},
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// The central gateway that routes events between channels, storage, and the provider.
pub struct Gateway {
    provider: Arc<dyn Provider>,
    channels: HashMap<String, Arc<dyn Channel>>,
    storage: Arc<dyn Storage>,
    /// Senders with an event in flight. Later events from them queue here.
    active_senders: Mutex<HashMap<String, VecDeque<IncomingEvent>>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        provider: Arc<dyn Provider>,
        channels: HashMap<String, Arc<dyn Channel>>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            provider,
            channels,
            storage,
            active_senders: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until ctrl-c.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Evrika gateway running | provider: {} | channels: {}",
            self.provider.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
        );

        let (tx, mut rx) = mpsc::channel::<IncomingEvent>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(event) = channel_rx.recv().await {
                    if tx.send(event).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Main event loop with graceful shutdown.
        loop {
            tokio::select! {
                incoming = rx.recv() => {
                    let Some(event) = incoming else {
                        warn!("all channels closed");
                        break;
                    };
                    self.clone().dispatch_event(event).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Dispatch an event: queue it if the sender is busy, otherwise claim the
    /// sender and spawn a worker for it. The claim happens before the spawn,
    /// so a sender's events reach its worker in arrival order.
    async fn dispatch_event(self: Arc<Self>, event: IncomingEvent) {
        let sender_key = format!("{}:{}", event.channel, event.sender.external_id);

        {
            let mut active = self.active_senders.lock().await;
            if let Some(queue) = active.get_mut(&sender_key) {
                debug!("queued event from {sender_key} (event in progress)");
                queue.push_back(event);
                return;
            }
            active.insert(sender_key.clone(), VecDeque::new());
        }

        tokio::spawn(async move {
            self.drain_sender(sender_key, event).await;
        });
    }

    /// Handle `first`, then everything queued behind it, and release the sender.
    async fn drain_sender(&self, sender_key: String, first: IncomingEvent) {
        self.handle_event(first).await;

        loop {
            let next = {
                let mut active = self.active_senders.lock().await;
                let queued = active.get_mut(&sender_key).and_then(VecDeque::pop_front);
                if queued.is_none() {
                    active.remove(&sender_key);
                }
                queued
            };

            match next {
                Some(queued) => self.handle_event(queued).await,
                None => break,
            }
        }
    }

    /// Handle one event end to end. Never fails: every error ends in a log
    /// line and, where it helps the user, an apology.
    async fn handle_event(&self, event: IncomingEvent) {
        if let Some(ref callback_id) = event.callback_id {
            if let Some(channel) = self.channels.get(&event.channel) {
                if let Err(e) = channel.answer_callback(callback_id).await {
                    warn!("failed to answer callback {callback_id}: {e}");
                }
            }
        }

        let Some(account) = self.resolve_account(&event).await else {
            return;
        };

        let turn = Turn::of(&account);
        let effects = plan(&turn, &event.kind);
        match &turn {
            Turn::Active { subject } => debug!(
                "event from {} ({}), subject {subject}: {:?}",
                event.sender.display(),
                account.external_id,
                event.kind
            ),
            _ => debug!(
                "event from {} ({}) in {turn:?}: {:?}",
                event.sender.display(),
                account.external_id,
                event.kind
            ),
        }
        if effects.is_empty() {
            info!(
                "ignoring {:?} from telegram_id={}",
                event.kind, account.external_id
            );
            return;
        }

        for effect in effects {
            if !self.apply(&event, &account, effect).await {
                break;
            }
        }
    }

    /// Load the sender's account. `/start` creates it on first contact; any
    /// other event from an unknown sender is dropped.
    async fn resolve_account(&self, event: &IncomingEvent) -> Option<Account> {
        let external_id = event.sender.external_id;
        let result = match event.kind {
            EventKind::Command(Command::Start) => {
                self.storage.get_or_create(&event.sender).await.map(Some)
            }
            _ => self.storage.find_account(external_id).await,
        };

        match result {
            Ok(Some(account)) => Some(account),
            Ok(None) => {
                let e = EvrikaError::NotFound(format!("no account for telegram_id={external_id}"));
                warn!("dropping {:?}: {e}", event.kind);
                None
            }
            Err(e) => {
                error!("account lookup failed for telegram_id={external_id}: {e}");
                self.deliver(event, OutgoingMessage::text(texts::STORAGE_APOLOGY))
                    .await;
                None
            }
        }
    }

    /// Execute one effect. Returns `false` when the rest of the turn must be skipped.
    async fn apply(&self, event: &IncomingEvent, account: &Account, effect: Effect) -> bool {
        let state_change = match effect {
            Effect::Send(message) => {
                self.deliver(event, message).await;
                return true;
            }
            Effect::Record {
                role,
                content,
                is_command,
            } => {
                self.record(account, role, &content, is_command).await;
                return true;
            }
            Effect::Answer { question } => {
                self.answer(event, account, &question).await;
                return true;
            }
            Effect::AcceptTerms => self.storage.accept_terms(account.id).await,
            Effect::WithdrawConsent => self.storage.withdraw_consent(account.id).await,
            Effect::SelectSubject(subject) => {
                let result = self.storage.set_subject(account.id, &subject).await;
                if result.is_ok() {
                    info!(
                        "telegram_id={} selected subject {subject}",
                        account.external_id
                    );
                }
                result
            }
        };

        match state_change {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "state update failed for telegram_id={}: {e}",
                    account.external_id
                );
                self.deliver(event, OutgoingMessage::text(texts::STORAGE_APOLOGY))
                    .await;
                false
            }
        }
    }

    /// Ask the provider and relay its answer verbatim.
    async fn answer(&self, event: &IncomingEvent, account: &Account, question: &str) {
        match self.provider.complete(question).await {
            Ok(answer) => {
                self.deliver(event, OutgoingMessage::text(answer.clone()))
                    .await;
                self.record(account, Role::Assistant, &answer, false).await;
            }
            Err(e) => {
                error!(
                    "{} failed for telegram_id={}: {e}",
                    self.provider.name(),
                    account.external_id
                );
                self.deliver(event, OutgoingMessage::text(texts::PROCESSING_APOLOGY))
                    .await;
            }
        }
    }

    async fn record(&self, account: &Account, role: Role, content: &str, is_command: bool) {
        if let Err(e) = self
            .storage
            .record(account.id, role, content, is_command)
            .await
        {
            error!(
                "failed to record {} entry for telegram_id={}: {e}",
                role.as_str(),
                account.external_id
            );
        }
    }

    /// Send a reply to the event's chat. Failures are logged, never returned.
    async fn deliver(&self, event: &IncomingEvent, mut message: OutgoingMessage) {
        let Some(channel) = self.channels.get(&event.channel) else {
            error!("no channel named {} for reply", event.channel);
            return;
        };
        message.reply_target = event.reply_target.clone();

        match channel.send(message).await {
            Ok(()) => {}
            Err(EvrikaError::Blocked(e)) => {
                info!(
                    "telegram_id={} blocked the bot: {e}",
                    event.sender.external_id
                );
            }
            Err(e) => {
                error!(
                    "failed to send reply to telegram_id={}: {e}",
                    event.sender.external_id
                );
            }
        }
    }

    /// Graceful shutdown: stop channels.
    async fn shutdown(&self) {
        info!("Shutting down...");

        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("Shutdown complete.");
    }
}
