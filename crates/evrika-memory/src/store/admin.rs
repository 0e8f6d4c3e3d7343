//! Administrator queries: listing, bulk flag toggles, and the statistics summary.

use super::accounts::{account_from_row, AccountRow, ACCOUNT_COLUMNS};
use super::{parse_timestamp, Store};
use chrono::NaiveDate;
use evrika_core::{
    account::{Account, DailyUsage, Role, TranscriptEntry},
    error::EvrikaError,
};
use tracing::info;

/// Filter for [`Store::list_users`].
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Substring of telegram id, username, first or last name.
    pub search: Option<String>,
    pub banned: Option<bool>,
    pub paid: Option<bool>,
    pub limit: i64,
}

/// Filter for [`Store::list_messages`].
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Telegram id of the account.
    pub external_id: Option<i64>,
    pub role: Option<Role>,
    /// Substring of the content.
    pub search: Option<String>,
    pub limit: i64,
}

/// Aggregates shown on the statistics page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsSummary {
    pub total_users: i64,
    pub today_new_users: i64,
    pub total_commands: i64,
    pub total_messages: i64,
    pub series: Vec<DailyUsage>,
}

/// Account flags an administrator may toggle.
#[derive(Debug, Clone, Copy)]
enum Flag {
    Banned,
    Paid,
}

impl Flag {
    fn column(self) -> &'static str {
        match self {
            Self::Banned => "is_banned",
            Self::Paid => "is_paid",
        }
    }
}

fn like_pattern(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"))
}

impl Store {
    /// List accounts, newest first.
    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<Account>, EvrikaError> {
        let pattern = like_pattern(&filter.search);
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users \
             WHERE (? IS NULL OR is_banned = ?) \
             AND (? IS NULL OR is_paid = ?) \
             AND (? IS NULL OR CAST(telegram_id AS TEXT) LIKE ? OR username LIKE ? \
                  OR first_name LIKE ? OR last_name LIKE ?) \
             ORDER BY start_date DESC, id DESC LIMIT ?"
        ))
        .bind(filter.banned)
        .bind(filter.banned)
        .bind(filter.paid)
        .bind(filter.paid)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        rows.into_iter().map(account_from_row).collect()
    }

    /// Ban or unban accounts by Telegram id. Returns the number of accounts changed.
    pub async fn set_banned(&self, external_ids: &[i64], banned: bool) -> Result<u64, EvrikaError> {
        self.set_flag(Flag::Banned, external_ids, banned).await
    }

    /// Mark accounts as paid or free by Telegram id. Returns the number of accounts changed.
    pub async fn set_paid(&self, external_ids: &[i64], paid: bool) -> Result<u64, EvrikaError> {
        self.set_flag(Flag::Paid, external_ids, paid).await
    }

    async fn set_flag(
        &self,
        flag: Flag,
        external_ids: &[i64],
        value: bool,
    ) -> Result<u64, EvrikaError> {
        let col = flag.column();
        let sql = format!("UPDATE users SET {col} = ? WHERE telegram_id = ? AND {col} != ?");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EvrikaError::Storage(format!("begin failed: {e}")))?;

        let mut changed = 0;
        for id in external_ids {
            let result = sqlx::query(&sql)
                .bind(value)
                .bind(id)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(|e| EvrikaError::Storage(format!("update failed: {e}")))?;
            changed += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| EvrikaError::Storage(format!("commit failed: {e}")))?;

        info!("admin: set {col}={value} on {changed} of {} accounts", external_ids.len());
        Ok(changed)
    }

    /// List transcript rows, newest first.
    pub async fn list_messages(
        &self,
        filter: &MessageFilter,
    ) -> Result<Vec<TranscriptEntry>, EvrikaError> {
        let pattern = like_pattern(&filter.search);
        let role = filter.role.map(|r| r.as_str());
        let rows: Vec<(i64, i64, i64, String, String, String)> = sqlx::query_as(
            "SELECT m.id, m.user_id, u.telegram_id, m.role, m.content, m.timestamp \
             FROM messages m JOIN users u ON u.id = m.user_id \
             WHERE (? IS NULL OR u.telegram_id = ?) \
             AND (? IS NULL OR m.role = ?) \
             AND (? IS NULL OR m.content LIKE ?) \
             ORDER BY m.timestamp DESC, m.id DESC LIMIT ?",
        )
        .bind(filter.external_id)
        .bind(filter.external_id)
        .bind(role)
        .bind(role)
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        rows.into_iter()
            .map(|(id, user_id, external_id, role, content, timestamp)| {
                let role = Role::parse(&role)
                    .ok_or_else(|| EvrikaError::Storage(format!("unknown role '{role}'")))?;
                Ok(TranscriptEntry {
                    id,
                    user_id,
                    external_id,
                    role,
                    content,
                    created_at: parse_timestamp(&timestamp)?,
                })
            })
            .collect()
    }

    /// Totals plus the per-day series. "Today" is `today` in the reference
    /// time zone; accounts count as new when their start date falls on it.
    pub async fn statistics(&self, today: NaiveDate) -> Result<StatisticsSummary, EvrikaError> {
        let (total_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        let offset_minutes = self.offset.local_minus_utc() / 60;
        let (today_new_users,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE date(start_date, ?) = ?")
                .bind(format!("{offset_minutes:+} minutes"))
                .bind(today.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        let (total_commands, total_messages): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(command_count), 0), COALESCE(SUM(message_count), 0) \
             FROM user_statistics",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        Ok(StatisticsSummary {
            total_users,
            today_new_users,
            total_commands,
            total_messages,
            series: self.usage_series().await?,
        })
    }
}
