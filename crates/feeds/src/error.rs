//! Error types for JSON-RPC operations.

use thiserror::Error;

/// Errors that can occur talking to a JSON-RPC node.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket disconnected: {0}")]
    Disconnected(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Failed to parse message: {0}")]
    ParseError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RpcError::ConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::ParseError(err.to_string())
    }
}

impl From<url::ParseError> for RpcError {
    fn from(err: url::ParseError) -> Self {
        RpcError::ConnectionFailed(err.to_string())
    }
}

impl From<chainwatch_core::AmountError> for RpcError {
    fn from(err: chainwatch_core::AmountError) -> Self {
        RpcError::ParseError(err.to_string())
    }
}
