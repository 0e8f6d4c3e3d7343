//! Transcript rows.

use super::Store;
use evrika_core::{account::Role, error::EvrikaError};

impl Store {
    /// Append one transcript row. Counters are handled separately.
    pub async fn record_entry(
        &self,
        account_id: i64,
        role: Role,
        content: &str,
    ) -> Result<(), EvrikaError> {
        sqlx::query("INSERT INTO messages (user_id, role, content) VALUES (?, ?, ?)")
            .bind(account_id)
            .bind(role.as_str())
            .bind(content)
            .execute(&self.pool)
            .await
            .map_err(|e| EvrikaError::Storage(format!("insert message failed: {e}")))?;
        Ok(())
    }

    /// Number of transcript rows for an account, optionally for one role.
    pub async fn count_entries(
        &self,
        account_id: i64,
        role: Option<Role>,
    ) -> Result<i64, EvrikaError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages WHERE user_id = ? AND (? IS NULL OR role = ?)",
        )
        .bind(account_id)
        .bind(role.map(|r| r.as_str()))
        .bind(role.map(|r| r.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| EvrikaError::Storage(format!("query failed: {e}")))?;
        Ok(count)
    }
}
