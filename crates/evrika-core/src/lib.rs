//! # evrika-core
//!
//! Core types, traits, configuration, and error handling for Evrika.

pub mod account;
pub mod config;
pub mod error;
pub mod message;
pub mod subjects;
pub mod traits;

pub use config::shellexpand;
