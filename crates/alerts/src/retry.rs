//! Fixed-delay retries for alert delivery.

use std::future::Future;
use std::time::Duration;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or attempts run out; returns the last error.
    pub async fn run<T, E, F, Fut>(&self, channel: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    error!(
                        "Failed to send {} alert (attempt {}/{}): {}",
                        channel, attempt, attempts, e
                    );
                    if attempt >= attempts {
                        return Err(e);
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(self.delay).await;
        }
    }
}
