use thiserror::Error;

/// Top-level error type for Evrika.
#[derive(Debug, Error)]
pub enum EvrikaError {
    /// An account was expected to exist but does not.
    #[error("not found: {0}")]
    NotFound(String),

    /// Outbound message could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The recipient blocked the bot.
    #[error("blocked by user: {0}")]
    Blocked(String),

    /// Error from the completion provider.
    #[error("provider error: {0}")]
    Provider(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
