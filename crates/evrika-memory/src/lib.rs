//! # evrika-memory
//!
//! Persistent accounts, transcript, and usage statistics for Evrika (SQLite-backed).

pub mod store;

pub use store::{MessageFilter, StatisticsSummary, Store, UserFilter};
