//! Telegram delivery.

use crate::RetryPolicy;
use async_trait::async_trait;
use chainwatch_core::{AlertError, AlertSink};
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::info;

/// Sends alerts to one Telegram chat as plain text.
pub struct TelegramSink {
    bot: Bot,
    chat: Recipient,
    retry: RetryPolicy,
}

impl TelegramSink {
    /// `chat_id` is either a numeric chat id or an `@channel` username.
    pub fn new(token: &str, chat_id: &str, retry: RetryPolicy) -> Self {
        Self {
            bot: Bot::new(token),
            chat: parse_recipient(chat_id),
            retry,
        }
    }
}

fn parse_recipient(chat_id: &str) -> Recipient {
    let chat_id = chat_id.trim();
    match chat_id.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => Recipient::ChannelUsername(chat_id.to_string()),
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        self.retry
            .run("telegram", || async {
                self.bot
                    .send_message(self.chat.clone(), message)
                    .await
                    .map(|_| ())
            })
            .await
            .map_err(|e| match e {
                teloxide::RequestError::Api(api) => AlertError::Rejected(api.to_string()),
                other => AlertError::Delivery(other.to_string()),
            })?;
        info!("Telegram alert sent");
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
