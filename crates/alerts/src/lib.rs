//! Alert delivery channels.
//!
//! This crate provides:
//! - Telegram delivery through the Bot API
//! - Generic webhook delivery (`POST {"text": ...}`)
//! - A log-only sink for running without any channel
//! - `Notifier`, which fans one alert out to every configured channel

pub mod config;
pub mod notifier;
pub mod retry;
pub mod telegram;
pub mod webhook;

pub use config::NotifierConfig;
pub use notifier::{LogSink, Notifier};
pub use retry::RetryPolicy;
pub use telegram::TelegramSink;
pub use webhook::WebhookSink;
