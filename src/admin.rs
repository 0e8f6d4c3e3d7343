//! Administrator subcommands: listing accounts and transcript, bulk flag
//! toggles, and usage statistics, printed to stdout.

use evrika_core::account::{Account, Role, TranscriptEntry};
use evrika_memory::{MessageFilter, StatisticsSummary, Store, UserFilter};

/// Longest transcript excerpt printed per row, in characters.
const EXCERPT_CHARS: usize = 80;

/// Which account flag a bulk action changes.
#[derive(Debug, Clone, Copy)]
pub enum FlagAction {
    Ban,
    Unban,
    Paid,
    Free,
}

pub async fn list_users(store: &Store, filter: &UserFilter) -> anyhow::Result<()> {
    let users = store.list_users(filter).await?;
    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }
    println!(
        "{:>12}  {:<20}  {:<24}  {:<16}  {:<5} {:<6}  joined (UTC)",
        "telegram_id", "username", "name", "subject", "paid", "banned"
    );
    for user in &users {
        println!("{}", format_user(user));
    }
    println!("\n{} user(s)", users.len());
    Ok(())
}

fn format_user(user: &Account) -> String {
    let name = match user.last_name {
        Some(ref ln) => format!("{} {ln}", user.first_name),
        None => user.first_name.clone(),
    };
    format!(
        "{:>12}  {:<20}  {:<24}  {:<16}  {:<5} {:<6}  {}",
        user.external_id,
        user.username.as_deref().map(|u| format!("@{u}")).unwrap_or_default(),
        name,
        user.last_subject.as_deref().unwrap_or("-"),
        yes_no(user.is_paid),
        yes_no(user.is_banned),
        user.start_date.format("%Y-%m-%d %H:%M"),
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub async fn set_flag(store: &Store, action: FlagAction, ids: &[i64]) -> anyhow::Result<()> {
    let changed = match action {
        FlagAction::Ban => store.set_banned(ids, true).await?,
        FlagAction::Unban => store.set_banned(ids, false).await?,
        FlagAction::Paid => store.set_paid(ids, true).await?,
        FlagAction::Free => store.set_paid(ids, false).await?,
    };
    println!("{action:?}: {changed} of {} account(s) changed", ids.len());
    Ok(())
}

pub async fn list_messages(store: &Store, filter: &MessageFilter) -> anyhow::Result<()> {
    let entries = store.list_messages(filter).await?;
    if entries.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    println!("\n{} message(s)", entries.len());
    Ok(())
}

fn format_entry(entry: &TranscriptEntry) -> String {
    let role = match entry.role {
        Role::User => "user",
        Role::Assistant => "bot",
    };
    format!(
        "{}  {:>12}  {:<4}  {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.external_id,
        role,
        excerpt(&entry.content, EXCERPT_CHARS),
    )
}

/// First `max` characters on a single line.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}

pub async fn stats(store: &Store) -> anyhow::Result<()> {
    let summary = store.statistics(store.today()).await?;
    print!("{}", format_stats(&summary));
    Ok(())
}

fn format_stats(s: &StatisticsSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total users:     {}\n", s.total_users));
    out.push_str(&format!("New users today: {}\n", s.today_new_users));
    out.push_str(&format!("Total commands:  {}\n", s.total_commands));
    out.push_str(&format!("Total messages:  {}\n", s.total_messages));

    if !s.series.is_empty() {
        out.push_str(&format!(
            "\n{:<10}  {:>6}  {:>8}  {:>8}\n",
            "date", "users", "commands", "messages"
        ));
        for day in &s.series {
            out.push_str(&format!(
                "{:<10}  {:>6}  {:>8}  {:>8}\n",
                day.date, day.user_count, day.command_count, day.message_count
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use evrika_core::account::{ConsentState, DailyUsage};

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("строка\nвторая", 80), "строка вторая");
        assert_eq!(excerpt("абвгд", 3), "абв…");
    }

    #[test]
    fn test_format_user_row() {
        let user = Account {
            id: 1,
            external_id: 42,
            username: Some("ivan".into()),
            first_name: "Иван".into(),
            last_name: Some("Петров".into()),
            last_subject: Some("Алгебра".into()),
            consent: ConsentState::SubjectSelected,
            is_paid: true,
            is_banned: false,
            start_date: Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap(),
        };
        let row = format_user(&user);
        assert!(row.contains("@ivan"));
        assert!(row.contains("Иван Петров"));
        assert!(row.contains("Алгебра"));
        assert!(row.contains("2026-01-15 09:30"));
    }

    #[test]
    fn test_format_stats_lists_series() {
        let summary = StatisticsSummary {
            total_users: 3,
            today_new_users: 1,
            total_commands: 2,
            total_messages: 5,
            series: vec![DailyUsage {
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                user_count: 3,
                command_count: 2,
                message_count: 5,
            }],
        };
        let out = format_stats(&summary);
        assert!(out.contains("Total users:     3"));
        assert!(out.contains("New users today: 1"));
        assert!(out.contains("2026-02-01"));
    }
}
