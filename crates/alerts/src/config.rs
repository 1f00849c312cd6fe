//! Alert channel configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which channels to deliver alerts to, and how hard to try.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Telegram bot token
    pub telegram_bot_token: Option<String>,
    /// Telegram chat id (numeric) or `@channel`
    pub telegram_chat_id: Option<String>,
    /// Webhook receiving `POST {"text": ...}`
    pub webhook_url: Option<String>,
    /// Attempts per channel before giving up
    pub retry_attempts: u32,
    /// Pause between attempts (ms)
    pub retry_delay_ms: u64,
}

impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("telegram_bot_token", &self.telegram_bot_token.as_ref().map(|_| "***"))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("webhook_url", &self.webhook_url)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_chat_id: None,
            webhook_url: None,
            retry_attempts: 3,
            retry_delay_ms: 5_000,
        }
    }
}

impl NotifierConfig {
    /// Fill unset channels from `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID` and
    /// `ALERT_WEBHOOK_URL`. Values already present win over the environment.
    pub fn with_env(mut self) -> Self {
        self.merge_env(|key| std::env::var(key).ok());
        self
    }

    fn merge_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if self.telegram_bot_token.is_none() {
            self.telegram_bot_token = get("TELEGRAM_BOT_TOKEN");
        }
        if self.telegram_chat_id.is_none() {
            self.telegram_chat_id = get("TELEGRAM_CHAT_ID");
        }
        if self.webhook_url.is_none() {
            self.webhook_url = get("ALERT_WEBHOOK_URL");
        }
    }

    /// Token and chat id, when both are set.
    pub fn telegram(&self) -> Option<(&str, &str)> {
        match (&self.telegram_bot_token, &self.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                Some((token.as_str(), chat.as_str()))
            }
            _ => None,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
