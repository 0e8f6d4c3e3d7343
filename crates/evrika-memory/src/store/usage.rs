//! Per-day usage counters.

use super::{parse_date, Store};
use chrono::NaiveDate;
use evrika_core::{
    account::{Counter, DailyUsage},
    error::EvrikaError,
};

type UsageRow = (String, i64, i64, i64);

fn usage_from_row(
    (date, user_count, command_count, message_count): UsageRow,
) -> Result<DailyUsage, EvrikaError> {
    Ok(DailyUsage {
        date: parse_date(&date)?,
        user_count,
        command_count,
        message_count,
    })
}

impl Store {
    /// Increment one counter of the given day, creating the row at 1.
    pub async fn bump_counter_on(
        &self,
        counter: Counter,
        date: NaiveDate,
    ) -> Result<(), EvrikaError> {
        let col = counter.column();
        sqlx::query(&format!(
            "INSERT INTO user_statistics (date, {col}) VALUES (?, 1) \
             ON CONFLICT(date) DO UPDATE SET {col} = {col} + 1"
        ))
        .bind(date.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("counter update failed: {e}")))?;
        Ok(())
    }

    /// Counters for one day, if any event happened on it.
    pub async fn usage_for(&self, date: NaiveDate) -> Result<Option<DailyUsage>, EvrikaError> {
        let row: Option<UsageRow> = sqlx::query_as(
            "SELECT date, user_count, command_count, message_count \
             FROM user_statistics WHERE date = ?",
        )
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        row.map(usage_from_row).transpose()
    }

    /// The full per-day series, oldest first.
    pub async fn usage_series(&self) -> Result<Vec<DailyUsage>, EvrikaError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            "SELECT date, user_count, command_count, message_count \
             FROM user_statistics ORDER BY date ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;

        rows.into_iter().map(usage_from_row).collect()
    }
}
