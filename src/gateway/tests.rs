//! End-to-end conversation tests: real SQLite store, mock channel and provider.

use super::Gateway;
use crate::texts;
use async_trait::async_trait;
use evrika_core::{
    account::{Account, ConsentState, Counter, Profile, Role},
    config::MemoryConfig,
    error::EvrikaError,
    message::{ButtonPayload, Command, EventKind, IncomingEvent, OutgoingMessage},
    traits::{Channel, Provider, Storage},
};
use evrika_memory::Store;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Copy)]
enum SendMode {
    Deliver,
    Fail,
    Blocked,
}

struct MockChannel {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    answered: Arc<Mutex<Vec<String>>>,
    mode: SendMode,
    /// Events handed to the gateway on `start`.
    inbox: Mutex<Option<mpsc::Receiver<IncomingEvent>>>,
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingEvent>, EvrikaError> {
        match self.inbox.lock().unwrap().take() {
            Some(rx) => Ok(rx),
            None => {
                let (_tx, rx) = mpsc::channel(1);
                Ok(rx)
            }
        }
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), EvrikaError> {
        // Record the attempt either way so tests can see what was tried.
        self.sent.lock().unwrap().push(message);
        match self.mode {
            SendMode::Deliver => Ok(()),
            SendMode::Fail => Err(EvrikaError::Delivery("connection reset".into())),
            SendMode::Blocked => Err(EvrikaError::Blocked("Forbidden: bot was blocked".into())),
        }
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), EvrikaError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }

    async fn stop(&self) -> Result<(), EvrikaError> {
        Ok(())
    }
}

struct MockProvider {
    questions: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, question: &str) -> Result<String, EvrikaError> {
        self.questions.lock().unwrap().push(question.to_string());
        if self.fail {
            Err(EvrikaError::Provider("yandexgpt returned 500".into()))
        } else {
            Ok("2 + 2 = 4 🎉".to_string())
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Which storage calls fail.
#[derive(Clone, Copy, Default)]
struct Faults {
    lookup: bool,
    state: bool,
}

/// A real store whose account lookups or state changes can be made to fail.
struct FaultyStorage {
    inner: Store,
    faults: Faults,
}

impl FaultyStorage {
    fn check(&self, failing: bool) -> Result<(), EvrikaError> {
        if failing {
            Err(EvrikaError::Storage("database is locked".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn get_or_create(&self, profile: &Profile) -> Result<Account, EvrikaError> {
        self.check(self.faults.lookup)?;
        self.inner.get_or_create(profile).await
    }

    async fn find_account(&self, external_id: i64) -> Result<Option<Account>, EvrikaError> {
        self.check(self.faults.lookup)?;
        self.inner.find_account(external_id).await
    }

    async fn ban_status(&self, external_id: i64) -> Result<bool, EvrikaError> {
        self.check(self.faults.lookup)?;
        self.inner.ban_status(external_id).await
    }

    async fn set_subject(&self, account_id: i64, subject: &str) -> Result<(), EvrikaError> {
        self.check(self.faults.state)?;
        self.inner.set_subject(account_id, subject).await
    }

    async fn accept_terms(&self, account_id: i64) -> Result<(), EvrikaError> {
        self.check(self.faults.state)?;
        self.inner.accept_terms(account_id).await
    }

    async fn withdraw_consent(&self, account_id: i64) -> Result<(), EvrikaError> {
        self.check(self.faults.state)?;
        self.inner.withdraw_consent(account_id).await
    }

    async fn record_entry(
        &self,
        account_id: i64,
        role: Role,
        content: &str,
    ) -> Result<(), EvrikaError> {
        self.inner.record_entry(account_id, role, content).await
    }

    async fn bump_counter(&self, counter: Counter) -> Result<(), EvrikaError> {
        self.inner.bump_counter(counter).await
    }
}

struct Harness {
    gateway: Arc<Gateway>,
    store: Store,
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    answered: Arc<Mutex<Vec<String>>>,
    questions: Arc<Mutex<Vec<String>>>,
    inbox: Mutex<Option<mpsc::Sender<IncomingEvent>>>,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn new() -> Self {
        Self::build(SendMode::Deliver, false).await
    }

    async fn build(mode: SendMode, provider_fails: bool) -> Self {
        Self::build_with(mode, provider_fails, Faults::default()).await
    }

    async fn faulty(faults: Faults) -> Self {
        Self::build_with(SendMode::Deliver, false, faults).await
    }

    async fn build_with(mode: SendMode, provider_fails: bool, faults: Faults) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoryConfig {
            db_path: dir.path().join("evrika.db").to_string_lossy().into_owned(),
            utc_offset_hours: 3,
        };
        let store = Store::new(&config).await.unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        let answered = Arc::new(Mutex::new(Vec::new()));
        let questions = Arc::new(Mutex::new(Vec::new()));
        let (inbox_tx, inbox_rx) = mpsc::channel(256);

        let channel = MockChannel {
            sent: sent.clone(),
            answered: answered.clone(),
            mode,
            inbox: Mutex::new(Some(inbox_rx)),
        };
        let provider = MockProvider {
            questions: questions.clone(),
            fail: provider_fails,
        };
        let mut channels: HashMap<String, Arc<dyn Channel>> = HashMap::new();
        channels.insert("telegram".to_string(), Arc::new(channel));

        let storage = FaultyStorage {
            inner: store.clone(),
            faults,
        };
        let gateway = Arc::new(Gateway::new(
            Arc::new(provider),
            channels,
            Arc::new(storage),
        ));

        Self {
            gateway,
            store,
            sent,
            answered,
            questions,
            inbox: Mutex::new(Some(inbox_tx)),
            _dir: dir,
        }
    }

    async fn send(&self, external_id: i64, kind: EventKind) {
        self.gateway.handle_event(event(external_id, kind)).await;
    }

    /// The sending half of the channel's event stream; dropping it closes the channel.
    fn take_inbox(&self) -> mpsc::Sender<IncomingEvent> {
        self.inbox.lock().unwrap().take().unwrap()
    }

    /// Wait until at least `n` replies were attempted.
    async fn wait_for_sent(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let count = self.sent.lock().unwrap().len();
                if count >= n {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("replies did not arrive in time");
    }

    async fn text(&self, external_id: i64, text: &str) {
        self.send(external_id, EventKind::Text(text.to_string())).await;
    }

    async fn command(&self, external_id: i64, cmd: Command) {
        self.send(external_id, EventKind::Command(cmd)).await;
    }

    async fn press(&self, external_id: i64, payload: ButtonPayload) {
        self.send(external_id, EventKind::Button(payload)).await;
    }

    /// Take everything sent so far.
    fn drain(&self) -> Vec<OutgoingMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    /// An account that already picked `subject`.
    async fn active_account(&self, external_id: i64, subject: &str) -> i64 {
        let account = self.store.get_or_create(&profile(external_id)).await.unwrap();
        self.store.set_subject(account.id, subject).await.unwrap();
        account.id
    }

    async fn entries(&self, account_id: i64, role: Option<Role>) -> i64 {
        self.store.count_entries(account_id, role).await.unwrap()
    }
}

fn event(external_id: i64, kind: EventKind) -> IncomingEvent {
    let callback_id = matches!(kind, EventKind::Button(_)).then(|| format!("cb-{external_id}"));
    IncomingEvent {
        id: Uuid::new_v4(),
        channel: "telegram".to_string(),
        sender: profile(external_id),
        kind,
        reply_target: Some(external_id.to_string()),
        callback_id,
        timestamp: chrono::Utc::now(),
    }
}

fn profile(external_id: i64) -> Profile {
    Profile {
        external_id,
        first_name: "Ученик".to_string(),
        username: Some(format!("pupil{external_id}")),
        last_name: None,
    }
}

#[tokio::test]
async fn test_full_onboarding_and_question() {
    let h = Harness::new().await;

    // /start: account created, consent prompt with two buttons.
    h.command(42, Command::Start).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], {
        let mut m = texts::consent_prompt();
        m.reply_target = Some("42".into());
        m
    });
    assert_eq!(sent[0].button_count(), 2);
    let account = h.store.find_account(42).await.unwrap().unwrap();
    assert!(!account.is_banned);
    assert!(account.last_subject.is_none());
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.user_count, 1);
    assert_eq!(h.entries(account.id, None).await, 0, "/start is not recorded");

    // accept_terms: blurb, then subject menu.
    h.press(42, ButtonPayload::AcceptTerms).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, texts::CAPABILITIES);
    assert_eq!(sent[1].text, texts::SUBJECT_PROMPT);
    assert_eq!(sent[1].button_count(), 14);
    assert_eq!(h.answered.lock().unwrap().as_slice(), ["cb-42"]);
    assert_eq!(
        h.store.find_account(42).await.unwrap().unwrap().consent,
        ConsentState::SubjectPending
    );

    // subject_Алгебра: persisted and confirmed.
    h.press(42, ButtonPayload::Subject("Алгебра".into())).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains("Алгебра"));
    let account = h.store.find_account(42).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Алгебра"));
    assert_eq!(account.consent, ConsentState::SubjectSelected);

    // Free text goes to the provider verbatim; answer relayed verbatim.
    let before = h.entries(account.id, None).await;
    h.text(42, "Сколько будет 2+2?").await;
    assert_eq!(
        h.questions.lock().unwrap().as_slice(),
        ["Сколько будет 2+2?"]
    );
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, "2 + 2 = 4 🎉");
    assert_eq!(sent[0].reply_target.as_deref(), Some("42"));
    assert!(sent[0].keyboard.is_empty());
    assert_eq!(h.entries(account.id, None).await, before + 2);
    // The /subject row from accepting the terms, then the question.
    assert_eq!(h.entries(account.id, Some(Role::User)).await, 2);

    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.user_count, 1);
    assert_eq!(usage.message_count, 1);
    assert_eq!(usage.command_count, 1);
}

#[tokio::test]
async fn test_banned_user_gets_only_refusal() {
    let h = Harness::new().await;
    let account = h.store.get_or_create(&profile(7)).await.unwrap();
    h.store.set_banned(&[7], true).await.unwrap();

    h.command(7, Command::Start).await;
    h.text(7, "Привет!").await;
    h.press(7, ButtonPayload::AcceptTerms).await;
    h.command(7, Command::Help).await;

    let sent = h.drain();
    assert_eq!(sent.len(), 4);
    for msg in &sent {
        assert_eq!(msg.text, texts::REFUSAL);
        assert!(msg.keyboard.is_empty());
    }
    assert_eq!(h.entries(account.id, None).await, 0);
    assert!(h.questions.lock().unwrap().is_empty());

    let account = h.store.find_account(7).await.unwrap().unwrap();
    assert_eq!(account.consent, ConsentState::NoConsent);
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.command_count, 0);
    assert_eq!(usage.message_count, 0);
}

#[tokio::test]
async fn test_provider_error_sends_apology_without_assistant_row() {
    let h = Harness::build(SendMode::Deliver, true).await;
    let id = h.active_account(5, "Химия").await;

    h.text(5, "Что такое валентность?").await;

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::PROCESSING_APOLOGY);
    assert_eq!(h.entries(id, Some(Role::User)).await, 1);
    assert_eq!(h.entries(id, Some(Role::Assistant)).await, 0);
}

#[tokio::test]
async fn test_daily_counters_from_several_accounts() {
    let h = Harness::new().await;
    h.active_account(1, "Физика").await;
    h.active_account(2, "История").await;
    h.active_account(3, "Биология").await;

    h.text(1, "Почему небо голубое?").await;
    h.text(2, "Кто такой Пётр I?").await;
    h.text(3, "Что такое клетка?").await;
    h.command(1, Command::Faq).await;
    h.command(2, Command::Feedback).await;

    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.message_count, 3);
    assert_eq!(usage.command_count, 2);
    assert_eq!(usage.user_count, 3);
}

#[tokio::test]
async fn test_failed_delivery_still_records() {
    for mode in [SendMode::Fail, SendMode::Blocked] {
        let h = Harness::build(mode, false).await;
        let id = h.active_account(9, "Литература").await;

        h.command(9, Command::Help).await;
        h.text(9, "Кто написал «Евгения Онегина»?").await;

        // Both replies were attempted and both turns recorded.
        assert_eq!(h.drain().len(), 2);
        assert_eq!(h.entries(id, Some(Role::User)).await, 2);
        assert_eq!(h.entries(id, Some(Role::Assistant)).await, 2);
    }
}

#[tokio::test]
async fn test_unknown_sender_is_dropped() {
    let h = Harness::new().await;

    h.text(999, "Привет").await;
    h.command(999, Command::Help).await;
    h.press(999, ButtonPayload::AcceptTerms).await;

    assert!(h.drain().is_empty());
    assert!(h.store.find_account(999).await.unwrap().is_none());
    // The button press is still acknowledged.
    assert_eq!(h.answered.lock().unwrap().as_slice(), ["cb-999"]);
}

#[tokio::test]
async fn test_free_text_before_subject() {
    let h = Harness::new().await;

    h.command(3, Command::Start).await;
    h.drain();

    h.text(3, "Помоги с задачей").await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::CONSENT_PROMPT);

    h.press(3, ButtonPayload::AcceptTerms).await;
    h.drain();

    h.text(3, "Помоги с задачей").await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::SUBJECT_PROMPT);
    assert!(h.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_subject_command_keeps_subject_and_counts_as_command() {
    let h = Harness::new().await;
    let id = h.active_account(4, "География").await;

    h.command(4, Command::Subject).await;

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].button_count(), 14);
    let account = h.store.find_account(4).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("География"));
    assert_eq!(h.entries(id, Some(Role::User)).await, 1);
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.command_count, 1);

    // Picking another subject overwrites the old one.
    h.press(4, ButtonPayload::Subject("Геометрия".into())).await;
    let account = h.store.find_account(4).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Геометрия"));
}

#[tokio::test]
async fn test_decline_terms_clears_subject() {
    let h = Harness::new().await;
    h.active_account(6, "Алгебра").await;

    h.press(6, ButtonPayload::DeclineTerms).await;

    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::CONSENT_PROMPT);
    let account = h.store.find_account(6).await.unwrap().unwrap();
    assert_eq!(account.consent, ConsentState::NoConsent);
    assert!(account.last_subject.is_none());

    h.text(6, "Вопрос").await;
    assert_eq!(h.drain()[0].text, texts::CONSENT_PROMPT);
    assert!(h.questions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_accept_terms_twice_shows_menu_each_time() {
    let h = Harness::new().await;
    h.command(8, Command::Start).await;
    h.drain();

    for _ in 0..2 {
        h.press(8, ButtonPayload::AcceptTerms).await;
        let sent = h.drain();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].button_count(), 14);
    }
    let account = h.store.find_account(8).await.unwrap().unwrap();
    assert_eq!(h.entries(account.id, Some(Role::Assistant)).await, 2);
}

#[tokio::test]
async fn test_unknown_button_is_ignored() {
    let h = Harness::new().await;
    h.active_account(10, "Информатика").await;

    h.press(10, ButtonPayload::Unknown("subject_Астрология".into()))
        .await;

    assert!(h.drain().is_empty());
    assert_eq!(h.answered.lock().unwrap().as_slice(), ["cb-10"]);
    let account = h.store.find_account(10).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Информатика"));
}

#[tokio::test]
async fn test_repeated_start_creates_one_account() {
    let h = Harness::new().await;
    h.command(11, Command::Start).await;
    h.command(11, Command::Start).await;

    assert_eq!(h.drain().len(), 2);
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.user_count, 1);
    assert_eq!(usage.command_count, 0);
}

#[tokio::test]
async fn test_subject_flow_before_consent() {
    let h = Harness::new().await;
    h.command(12, Command::Start).await;
    h.drain();

    h.command(12, Command::Subject).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::SUBJECT_PROMPT);
    assert_eq!(sent[0].button_count(), 14);

    h.press(12, ButtonPayload::Subject("Химия".into())).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::subject_confirmation("Химия"));

    let account = h.store.find_account(12).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Химия"));
    assert_eq!(account.consent, ConsentState::SubjectSelected);
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.command_count, 1);
}

#[tokio::test]
async fn test_accept_terms_logs_subject_command() {
    let h = Harness::new().await;
    h.command(13, Command::Start).await;
    h.press(13, ButtonPayload::AcceptTerms).await;

    let account = h.store.find_account(13).await.unwrap().unwrap();
    assert_eq!(h.entries(account.id, Some(Role::User)).await, 1);
    let usage = h.store.usage_for(h.store.today()).await.unwrap().unwrap();
    assert_eq!(usage.command_count, 1);
    assert_eq!(usage.message_count, 0);
}

#[tokio::test]
async fn test_lookup_failure_sends_storage_apology() {
    let h = Harness::faulty(Faults {
        lookup: true,
        ..Default::default()
    })
    .await;

    h.command(14, Command::Start).await;
    h.text(14, "Привет").await;

    let sent = h.drain();
    assert_eq!(sent.len(), 2);
    for msg in &sent {
        assert_eq!(msg.text, texts::STORAGE_APOLOGY);
        assert_eq!(msg.reply_target.as_deref(), Some("14"));
    }
    assert!(h.questions.lock().unwrap().is_empty());
    assert!(h.store.find_account(14).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_state_change_stops_the_turn() {
    let h = Harness::faulty(Faults {
        state: true,
        ..Default::default()
    })
    .await;
    let id = h.active_account(15, "Алгебра").await;

    h.press(15, ButtonPayload::Subject("Физика".into())).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::STORAGE_APOLOGY);
    let account = h.store.find_account(15).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Алгебра"));

    h.press(15, ButtonPayload::AcceptTerms).await;
    let sent = h.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, texts::STORAGE_APOLOGY);

    // Nothing after the failed update ran.
    assert_eq!(h.entries(id, None).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_events_from_one_sender_run_in_arrival_order() {
    let h = Harness::new().await;
    h.active_account(60, "Алгебра").await;

    let script = [
        (EventKind::Command(Command::Faq), texts::FAQ.to_string()),
        (EventKind::Command(Command::Help), texts::HELP.to_string()),
        (
            EventKind::Button(ButtonPayload::Subject("Химия".into())),
            texts::subject_confirmation("Химия"),
        ),
        (EventKind::Command(Command::Feedback), texts::FEEDBACK.to_string()),
        (
            EventKind::Button(ButtonPayload::Subject("Физика".into())),
            texts::subject_confirmation("Физика"),
        ),
        (
            EventKind::Command(Command::Subject),
            texts::SUBJECT_PROMPT.to_string(),
        ),
    ];
    let rounds = 10;

    let inbox = h.take_inbox();
    let mut expected = Vec::new();
    for _ in 0..rounds {
        for (kind, reply) in &script {
            inbox.send(event(60, kind.clone())).await.unwrap();
            expected.push(reply.clone());
        }
    }
    drop(inbox);

    // Returns once the channel closes; handlers may still be running.
    h.gateway.clone().run().await.unwrap();
    h.wait_for_sent(expected.len()).await;

    let replies: Vec<String> = h.drain().into_iter().map(|m| m.text).collect();
    assert_eq!(replies, expected);
    let account = h.store.find_account(60).await.unwrap().unwrap();
    assert_eq!(account.last_subject.as_deref(), Some("Физика"));
}
