//! Fan-out alert delivery.

use crate::{NotifierConfig, RetryPolicy, TelegramSink, WebhookSink};
use async_trait::async_trait;
use chainwatch_core::{AlertError, AlertSink};
use std::sync::Arc;
use tracing::{info, warn};

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        warn!(target: "alerts", "{}", message);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Delivers each alert to every channel.
///
/// Succeeds when at least one channel accepted the alert; otherwise returns
/// the last channel error.
pub struct Notifier {
    channels: Vec<Arc<dyn AlertSink>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn AlertSink>>) -> Self {
        Self { channels }
    }

    /// Build every channel `config` has settings for. With none configured,
    /// alerts go to the log.
    pub fn from_config(config: &NotifierConfig) -> Self {
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_delay());
        let mut channels: Vec<Arc<dyn AlertSink>> = Vec::new();

        if let Some((token, chat_id)) = config.telegram() {
            channels.push(Arc::new(TelegramSink::new(token, chat_id, retry)));
        }
        if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.is_empty()) {
            channels.push(Arc::new(WebhookSink::new(url, retry)));
        }
        if channels.is_empty() {
            warn!("No alert channel configured, alerts will only be logged");
            channels.push(Arc::new(LogSink));
        }

        let names: Vec<&str> = channels.iter().map(|c| c.name()).collect();
        info!("Alert channels: {}", names.join(", "));
        Self { channels }
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name())
    }
}

#[async_trait]
impl AlertSink for Notifier {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        let mut delivered = false;
        let mut last_error = AlertError::NotConfigured;
        for channel in &self.channels {
            match channel.send(message).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    warn!("Alert channel {} failed: {}", channel.name(), e);
                    last_error = e;
                }
            }
        }
        if delivered {
            Ok(())
        } else {
            Err(last_error)
        }
    }

    fn name(&self) -> &str {
        "notifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct Scripted {
        ok: bool,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(ok: bool) -> Arc<Self> {
            Arc::new(Self {
                ok,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AlertSink for Scripted {
        async fn send(&self, message: &str) -> Result<(), AlertError> {
            self.seen.lock().unwrap().push(message.to_string());
            if self.ok {
                Ok(())
            } else {
                Err(AlertError::Delivery("down".into()))
            }
        }

        fn name(&self) -> &str {
            if self.ok {
                "up"
            } else {
                "down"
            }
        }
    }

    #[tokio::test]
    async fn test_one_success_is_enough() {
        let down = Scripted::new(false);
        let up = Scripted::new(true);
        let channels: Vec<Arc<dyn AlertSink>> = vec![down.clone(), up.clone()];
        let notifier = Notifier::new(channels);

        notifier.send("alert").await.unwrap();
        assert_eq!(down.seen.lock().unwrap().len(), 1);
        assert_eq!(up.seen.lock().unwrap().as_slice(), ["alert".to_string()]);
    }

    #[tokio::test]
    async fn test_all_failed_is_error() {
        let channels: Vec<Arc<dyn AlertSink>> = vec![Scripted::new(false), Scripted::new(false)];
        let notifier = Notifier::new(channels);
        assert!(matches!(
            notifier.send("alert").await,
            Err(AlertError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn test_no_channels_is_not_configured() {
        let notifier = Notifier::new(Vec::new());
        assert!(matches!(
            notifier.send("alert").await,
            Err(AlertError::NotConfigured)
        ));
    }

    #[test]
    fn test_from_config_falls_back_to_log() {
        let notifier = Notifier::from_config(&NotifierConfig::default());
        assert_eq!(notifier.channels().collect::<Vec<_>>(), vec!["log"]);
    }

    #[test]
    fn test_from_config_builds_configured_channels() {
        let config = NotifierConfig {
            telegram_bot_token: Some("123:abc".into()),
            telegram_chat_id: Some("42".into()),
            webhook_url: Some("http://127.0.0.1:9/hook".into()),
            ..Default::default()
        };
        let notifier = Notifier::from_config(&config);
        assert_eq!(notifier.channels().collect::<Vec<_>>(), vec!["telegram", "webhook"]);
    }
}
