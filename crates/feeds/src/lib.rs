//! Block stream access over Ethereum JSON-RPC.
//!
//! This crate provides the `BlockStreamSource` capability consumed by the
//! ingestion loop, and a WebSocket implementation of it.
//!
//! ## Architecture
//!
//! - `source` - The capability trait plus typed helpers for common calls
//! - `websocket` - `WsRpcClient`, a JSON-RPC client over one WebSocket
//! - `message` - Wire types (requests, responses, blocks, receipts, logs)

pub mod config;
pub mod error;
pub mod message;
pub mod source;
pub mod websocket;

pub use config::*;
pub use error::*;
pub use message::*;
pub use source::*;
pub use websocket::*;
