//! Alert delivery capability.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
    #[error("Rejected by channel: {0}")]
    Rejected(String),
    #[error("No alert channel configured")]
    NotConfigured,
}

/// Destination for formatted alert text.
///
/// Returning `Ok` means the alert was accepted by the channel; any error is
/// treated as "not delivered" and the caller may try again later.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), AlertError>;

    /// Short channel name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: AlertSink + ?Sized> AlertSink for Arc<T> {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        (**self).send(message).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
