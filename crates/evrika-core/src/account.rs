//! Account, transcript, and usage-counter types shared by storage and the gateway.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Profile fields reported by the messaging platform for a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Platform user id (Telegram `from.id`).
    pub external_id: i64,
    pub first_name: String,
    pub username: Option<String>,
    pub last_name: Option<String>,
}

impl Profile {
    /// Name used in logs: `@handle` when present, otherwise the display name.
    pub fn display(&self) -> String {
        if let Some(ref un) = self.username {
            format!("@{un}")
        } else if let Some(ref ln) = self.last_name {
            format!("{} {ln}", self.first_name)
        } else {
            self.first_name.clone()
        }
    }
}

/// Where an account stands in the consent / subject flow.
///
/// `SubjectSelected` holds exactly when the account has a `last_subject`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentState {
    /// Terms not accepted yet (or declined).
    #[default]
    NoConsent,
    /// Terms accepted, no subject chosen.
    SubjectPending,
    /// A subject has been chosen.
    SubjectSelected,
}

impl ConsentState {
    /// Column value stored in `users.consent`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoConsent => "none",
            Self::SubjectPending => "pending",
            Self::SubjectSelected => "selected",
        }
    }

    /// Parse a stored column value. Unknown values read as `NoConsent`.
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::SubjectPending,
            "selected" => Self::SubjectSelected,
            _ => Self::NoConsent,
        }
    }
}

/// A persisted account for one chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Internal row id.
    pub id: i64,
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub last_subject: Option<String>,
    pub consent: ConsentState,
    pub is_paid: bool,
    pub is_banned: bool,
    pub start_date: DateTime<Utc>,
}

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single transcript row, as listed by admin queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: i64,
    pub user_id: i64,
    pub external_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Per-day usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Counter {
    NewAccounts,
    Commands,
    Messages,
}

impl Counter {
    /// Column of `user_statistics` incremented by this counter.
    pub fn column(&self) -> &'static str {
        match self {
            Self::NewAccounts => "user_count",
            Self::Commands => "command_count",
            Self::Messages => "message_count",
        }
    }
}

/// One row of the daily usage series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub user_count: i64,
    pub command_count: i64,
    pub message_count: i64,
}
