//! # evrika-providers
//!
//! Completion provider implementations for Evrika.

pub mod yandexgpt;

pub use yandexgpt::YandexGptProvider;
