use crate::{
    account::{Account, Counter, Profile, Role},
    error::EvrikaError,
    message::{IncomingEvent, OutgoingMessage},
};
use async_trait::async_trait;

/// Completion provider trait.
///
/// Each call is stateless: one question in, one answer out.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Answer a single question.
    async fn complete(&self, question: &str) -> Result<String, EvrikaError>;

    /// Check if the provider is configured and ready.
    async fn is_available(&self) -> bool;
}

/// Messaging Channel trait.
///
/// Every messaging platform implements this trait to receive events and
/// send replies.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for inbound events.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingEvent>, EvrikaError>;

    /// Send a message, with or without an inline keyboard.
    async fn send(&self, message: OutgoingMessage) -> Result<(), EvrikaError>;

    /// Acknowledge a button press so the client stops its loading indicator.
    async fn answer_callback(&self, _callback_id: &str) -> Result<(), EvrikaError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), EvrikaError>;
}

/// Persistence capabilities the conversation flow depends on.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up an account by platform id, creating it on first contact.
    async fn get_or_create(&self, profile: &Profile) -> Result<Account, EvrikaError>;

    /// Look up an account by platform id.
    async fn find_account(&self, external_id: i64) -> Result<Option<Account>, EvrikaError>;

    /// Ban flag for an existing account; `NotFound` if there is none.
    async fn ban_status(&self, external_id: i64) -> Result<bool, EvrikaError>;

    /// Overwrite the selected subject.
    async fn set_subject(&self, account_id: i64, subject: &str) -> Result<(), EvrikaError>;

    /// Move an account without consent to "subject pending".
    async fn accept_terms(&self, account_id: i64) -> Result<(), EvrikaError>;

    /// Drop consent and the selected subject.
    async fn withdraw_consent(&self, account_id: i64) -> Result<(), EvrikaError>;

    /// Append one transcript row.
    async fn record_entry(
        &self,
        account_id: i64,
        role: Role,
        content: &str,
    ) -> Result<(), EvrikaError>;

    /// Increment today's counter by one.
    async fn bump_counter(&self, counter: Counter) -> Result<(), EvrikaError>;

    /// Append a transcript row; user rows also bump today's command or
    /// message counter.
    async fn record(
        &self,
        account_id: i64,
        role: Role,
        content: &str,
        is_command: bool,
    ) -> Result<(), EvrikaError> {
        self.record_entry(account_id, role, content).await?;
        if role == Role::User {
            let counter = if is_command {
                Counter::Commands
            } else {
                Counter::Messages
            };
            self.bump_counter(counter).await?;
        }
        Ok(())
    }
}
