use crate::{account::Profile, subjects};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Callback payload prefix for subject buttons.
pub const SUBJECT_PREFIX: &str = "subject_";

/// An inbound event from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub id: Uuid,
    /// Channel name (e.g. "telegram").
    pub channel: String,
    pub sender: Profile,
    pub kind: EventKind,
    /// Platform-specific target for routing the response (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
    /// Set for button presses that must be acknowledged on the platform.
    #[serde(default)]
    pub callback_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What the user did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Command(Command),
    Button(ButtonPayload),
    Text(String),
}

impl EventKind {
    /// Classify raw message text: known commands become `Command`, anything
    /// else (including unknown `/` prefixes) is free text.
    pub fn from_text(text: &str) -> Self {
        match Command::parse(text) {
            Some(cmd) => Self::Command(cmd),
            None => Self::Text(text.to_string()),
        }
    }
}

/// Known bot commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Faq,
    Feedback,
    Help,
    Subject,
}

impl Command {
    /// Parse a command from message text. Returns `None` for unknown `/` prefixes.
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        // Strip @botname suffix (e.g. "/help@evrika_bot" → "/help").
        let cmd = first.split('@').next().unwrap_or(first);
        match cmd {
            "/start" => Some(Self::Start),
            "/faq" => Some(Self::Faq),
            "/feedback" => Some(Self::Feedback),
            "/help" => Some(Self::Help),
            "/subject" => Some(Self::Subject),
            _ => None,
        }
    }

    /// Canonical command text, as recorded in the transcript.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::Faq => "/faq",
            Self::Feedback => "/feedback",
            Self::Help => "/help",
            Self::Subject => "/subject",
        }
    }
}

/// Opaque inline-button payloads understood by the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonPayload {
    AcceptTerms,
    DeclineTerms,
    Subject(String),
    Unknown(String),
}

impl ButtonPayload {
    pub fn parse(data: &str) -> Self {
        match data {
            "accept_terms" => Self::AcceptTerms,
            "decline_terms" => Self::DeclineTerms,
            _ => match data.strip_prefix(SUBJECT_PREFIX) {
                Some(name) if subjects::is_known(name) => Self::Subject(name.to_string()),
                _ => Self::Unknown(data.to_string()),
            },
        }
    }

    pub fn as_callback_data(&self) -> String {
        match self {
            Self::AcceptTerms => "accept_terms".to_string(),
            Self::DeclineTerms => "decline_terms".to_string(),
            Self::Subject(name) => format!("{SUBJECT_PREFIX}{name}"),
            Self::Unknown(raw) => raw.clone(),
        }
    }
}

/// A selectable inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub payload: ButtonPayload,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, payload: ButtonPayload) -> Self {
        Self {
            label: label.into(),
            payload,
        }
    }
}

/// An outgoing message to send back through a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Inline keyboard rows. Empty = plain text.
    #[serde(default)]
    pub keyboard: Vec<Vec<InlineButton>>,
    /// Platform-specific target for routing (e.g. Telegram chat_id).
    #[serde(default)]
    pub reply_target: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<InlineButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard,
            reply_target: None,
        }
    }

    /// Number of buttons across all rows.
    pub fn button_count(&self) -> usize {
        self.keyboard.iter().map(Vec::len).sum()
    }
}
