//! Conversation flow: where an account stands, and what each event does.
//!
//! `plan` is pure. The gateway resolves the account, derives its `Turn`,
//! and executes the returned effects in order.

use crate::texts;
use evrika_core::{
    account::{Account, ConsentState, Role},
    message::{ButtonPayload, Command, EventKind, OutgoingMessage},
};

/// Account state as seen by one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Turn {
    Banned,
    AwaitingConsent,
    AwaitingSubject,
    Active { subject: String },
}

impl Turn {
    pub fn of(account: &Account) -> Self {
        if account.is_banned {
            return Self::Banned;
        }
        match (account.consent, &account.last_subject) {
            (ConsentState::SubjectSelected, Some(subject)) => Self::Active {
                subject: subject.clone(),
            },
            (ConsentState::SubjectSelected, None) | (ConsentState::SubjectPending, _) => {
                Self::AwaitingSubject
            }
            (ConsentState::NoConsent, _) => Self::AwaitingConsent,
        }
    }
}

/// Side effects of one event, executed in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    /// Reply to the sender.
    Send(OutgoingMessage),
    /// Append to the transcript; user rows bump a usage counter.
    Record {
        role: Role,
        content: String,
        is_command: bool,
    },
    AcceptTerms,
    WithdrawConsent,
    SelectSubject(String),
    /// Ask the provider, then reply with and record its answer.
    Answer { question: String },
}

impl Effect {
    fn send_text(text: impl Into<String>) -> Self {
        Self::Send(OutgoingMessage::text(text))
    }

    fn record_reply(content: impl Into<String>) -> Self {
        Self::Record {
            role: Role::Assistant,
            content: content.into(),
            is_command: false,
        }
    }

    fn record_command(cmd: Command) -> Self {
        Self::Record {
            role: Role::User,
            content: cmd.as_str().to_string(),
            is_command: true,
        }
    }
}

/// Effects for `kind` arriving while the account is in `turn`.
pub(crate) fn plan(turn: &Turn, kind: &EventKind) -> Vec<Effect> {
    use Effect::*;

    if *turn == Turn::Banned {
        return vec![Effect::send_text(texts::REFUSAL)];
    }

    match kind {
        EventKind::Command(Command::Start) => vec![Send(texts::consent_prompt())],

        EventKind::Command(cmd @ (Command::Faq | Command::Feedback | Command::Help)) => {
            let text = match cmd {
                Command::Faq => texts::FAQ,
                Command::Feedback => texts::FEEDBACK,
                _ => texts::HELP,
            };
            vec![
                Effect::send_text(text),
                Effect::record_command(*cmd),
                Effect::record_reply(text),
            ]
        }

        EventKind::Command(Command::Subject) => vec![
            Send(texts::subject_menu()),
            Effect::record_command(Command::Subject),
        ],

        EventKind::Button(ButtonPayload::AcceptTerms) => vec![
            AcceptTerms,
            Effect::send_text(texts::CAPABILITIES),
            Effect::record_reply(texts::CAPABILITIES),
            Send(texts::subject_menu()),
            Effect::record_command(Command::Subject),
        ],

        EventKind::Button(ButtonPayload::DeclineTerms) => {
            vec![WithdrawConsent, Send(texts::consent_prompt())]
        }

        EventKind::Button(ButtonPayload::Subject(subject)) => {
            let confirmation = texts::subject_confirmation(subject);
            vec![
                SelectSubject(subject.clone()),
                Effect::send_text(confirmation.clone()),
                Effect::record_reply(confirmation),
            ]
        }

        EventKind::Button(ButtonPayload::Unknown(_)) => Vec::new(),

        EventKind::Text(text) => match turn {
            Turn::Active { .. } => vec![
                Record {
                    role: Role::User,
                    content: text.clone(),
                    is_command: false,
                },
                Answer {
                    question: text.clone(),
                },
            ],
            Turn::AwaitingSubject => vec![Send(texts::subject_menu())],
            Turn::AwaitingConsent | Turn::Banned => vec![Send(texts::consent_prompt())],
        },
    }
}
