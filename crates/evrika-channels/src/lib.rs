//! # evrika-channels
//!
//! Messaging platform integrations for Evrika.

pub mod telegram;
pub mod utils;
