//! Account registry: lookup, lazy creation, and consent/subject state.

use super::{parse_timestamp, Store};
use evrika_core::{
    account::{Account, ConsentState, Counter, Profile},
    error::EvrikaError,
};
use tracing::{info, warn};

/// Column list matching [`AccountRow`].
pub(super) const ACCOUNT_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, \
     last_subject, consent, is_paid, is_banned, start_date";

pub(super) type AccountRow = (
    i64,
    i64,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    String,
    bool,
    bool,
    String,
);

pub(super) fn account_from_row(row: AccountRow) -> Result<Account, EvrikaError> {
    let (
        id,
        external_id,
        username,
        first_name,
        last_name,
        last_subject,
        consent,
        is_paid,
        is_banned,
        start_date,
    ) = row;
    Ok(Account {
        id,
        external_id,
        username,
        first_name,
        last_name,
        last_subject,
        consent: ConsentState::parse(&consent),
        is_paid,
        is_banned,
        start_date: parse_timestamp(&start_date)?,
    })
}

impl Store {
    /// Look up an account by Telegram id, creating it on first contact.
    ///
    /// A concurrent insert for the same id loses on the unique constraint and
    /// falls back to a lookup. Only a successful insert bumps today's
    /// new-account counter.
    pub async fn get_or_create(&self, profile: &Profile) -> Result<Account, EvrikaError> {
        if let Some(account) = self.find_account(profile.external_id).await? {
            return Ok(account);
        }

        let inserted = sqlx::query(
            "INSERT INTO users (telegram_id, username, first_name, last_name) VALUES (?, ?, ?, ?)",
        )
        .bind(profile.external_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!("created account for telegram_id={}", profile.external_id);
                if let Err(e) = self.bump_counter_on(Counter::NewAccounts, self.today()).await {
                    warn!(
                        "new-account counter update failed for telegram_id={}: {e}",
                        profile.external_id
                    );
                }
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                info!(
                    "account for telegram_id={} created concurrently, reusing it",
                    profile.external_id
                );
            }
            Err(e) => {
                return Err(EvrikaError::Storage(format!("insert user failed: {e}")));
            }
        }

        self.find_account(profile.external_id)
            .await?
            .ok_or_else(|| {
                EvrikaError::NotFound(format!(
                    "account telegram_id={} vanished after insert",
                    profile.external_id
                ))
            })
    }

    /// Look up an account by Telegram id.
    pub async fn find_account(&self, external_id: i64) -> Result<Option<Account>, EvrikaError> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE telegram_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        row.map(account_from_row).transpose()
    }

    /// Ban flag of an existing account.
    pub async fn ban_status(&self, external_id: i64) -> Result<bool, EvrikaError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_banned FROM users WHERE telegram_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        row.map(|(banned,)| banned).ok_or_else(|| {
            EvrikaError::NotFound(format!("no account for telegram_id={external_id}"))
        })
    }

    /// Overwrite the selected subject. Selecting a subject implies consent.
    pub async fn set_subject(&self, account_id: i64, subject: &str) -> Result<(), EvrikaError> {
        let result = sqlx::query("UPDATE users SET last_subject = ?, consent = ? WHERE id = ?")
            .bind(subject)
            .bind(ConsentState::SubjectSelected.as_str())
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| EvrikaError::Storage(format!("update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(EvrikaError::NotFound(format!(
                "no account with id={account_id}"
            )));
        }
        Ok(())
    }

    /// `none -> pending`. Accounts that already chose a subject keep it.
    pub async fn accept_terms(&self, account_id: i64) -> Result<(), EvrikaError> {
        sqlx::query("UPDATE users SET consent = ? WHERE id = ? AND consent = ?")
            .bind(ConsentState::SubjectPending.as_str())
            .bind(account_id)
            .bind(ConsentState::NoConsent.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| EvrikaError::Storage(format!("update failed: {e}")))?;
        Ok(())
    }

    /// Back to `none`, forgetting the selected subject.
    pub async fn withdraw_consent(&self, account_id: i64) -> Result<(), EvrikaError> {
        sqlx::query("UPDATE users SET consent = ?, last_subject = NULL WHERE id = ?")
            .bind(ConsentState::NoConsent.as_str())
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(|e| EvrikaError::Storage(format!("update failed: {e}")))?;
        Ok(())
    }
}
