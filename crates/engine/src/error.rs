//! Engine error types.

use chainwatch_core::AmountError;
use chainwatch_feeds::RpcError;
use thiserror::Error;

/// Fatal failures when starting the monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Liveness check failed: {0}")]
    Connect(#[source] RpcError),

    #[error("newHeads subscription failed: {0}")]
    Subscribe(#[source] RpcError),
}

/// Reasons a single log entry is not turned into a transfer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("not a Transfer event")]
    NotTransfer,

    #[error("token {0} is not monitored")]
    Unmonitored(String),

    #[error("invalid emitting address: {0}")]
    BadToken(String),

    #[error("missing or malformed {0} topic")]
    BadTopic(&'static str),

    #[error("placeholder {0} address")]
    Placeholder(&'static str),

    #[error("invalid amount: {0}")]
    BadAmount(#[from] AmountError),

    #[error("amount too large for {0} decimals")]
    AmountRange(u32),
}
