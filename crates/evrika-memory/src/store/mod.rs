//! SQLite-backed persistent store.
//!
//! Split into focused submodules:
//! - `accounts`: account lookup/creation and consent/subject state
//! - `transcript`: transcript rows
//! - `usage`: per-day usage counters
//! - `admin`: listing, bulk flag toggles, and the statistics summary

mod accounts;
mod admin;
mod transcript;
mod usage;


pub use admin::{MessageFilter, StatisticsSummary, UserFilter};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use evrika_core::{
    account::{Account, Counter, Profile, Role},
    config::MemoryConfig,
    error::EvrikaError,
    shellexpand,
    traits::Storage,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Format SQLite's `datetime('now')` produces.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    /// Reference time zone for usage-counter date keys.
    offset: FixedOffset,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(config: &MemoryConfig) -> Result<Self, EvrikaError> {
        let offset = config.reference_offset()?;
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| EvrikaError::Storage(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| EvrikaError::Storage(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {db_path}");

        Ok(Self { pool, offset })
    }

    /// Today's date in the reference time zone.
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }

    /// Calendar date of an instant in the reference time zone.
    pub fn date_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), EvrikaError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        EvrikaError::Storage(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| EvrikaError::Storage(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    EvrikaError::Storage(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// Parse a stored UTC timestamp.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EvrikaError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| EvrikaError::Storage(format!("bad timestamp '{raw}': {e}")))
}

/// Parse a stored `YYYY-MM-DD` date key.
pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, EvrikaError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| EvrikaError::Storage(format!("bad date '{raw}': {e}")))
}

#[async_trait]
impl Storage for Store {
    async fn get_or_create(&self, profile: &Profile) -> Result<Account, EvrikaError> {
        Store::get_or_create(self, profile).await
    }

    async fn find_account(&self, external_id: i64) -> Result<Option<Account>, EvrikaError> {
        Store::find_account(self, external_id).await
    }

    async fn ban_status(&self, external_id: i64) -> Result<bool, EvrikaError> {
        Store::ban_status(self, external_id).await
    }

    async fn set_subject(&self, account_id: i64, subject: &str) -> Result<(), EvrikaError> {
        Store::set_subject(self, account_id, subject).await
    }

    async fn accept_terms(&self, account_id: i64) -> Result<(), EvrikaError> {
        Store::accept_terms(self, account_id).await
    }

    async fn withdraw_consent(&self, account_id: i64) -> Result<(), EvrikaError> {
        Store::withdraw_consent(self, account_id).await
    }

    async fn record_entry(
        &self,
        account_id: i64,
        role: Role,
        content: &str,
    ) -> Result<(), EvrikaError> {
        Store::record_entry(self, account_id, role, content).await
    }

    async fn bump_counter(&self, counter: Counter) -> Result<(), EvrikaError> {
        let today = self.today();
        Store::bump_counter_on(self, counter, today).await
    }
}
