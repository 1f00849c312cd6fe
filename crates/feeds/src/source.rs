//! The block stream capability consumed by the ingestion loop.

use crate::{Block, RpcError, TransactionReceipt};
use async_trait::async_trait;
use chainwatch_core::{parse_hex_u64, Address};
use serde_json::{json, Value};

/// Source of new-block notifications plus generic JSON-RPC calls.
///
/// Implementations do not reconnect on their own: when `recv` reports a
/// dropped stream, the caller decides whether to `close`, `connect` and
/// re-subscribe.
#[async_trait]
pub trait BlockStreamSource: Send + Sync {
    /// Open the connection if it is not already open.
    async fn connect(&self) -> Result<(), RpcError>;

    /// Close the connection. Any pending `recv` returns `None`.
    async fn close(&self);

    /// Generic JSON-RPC call.
    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// `eth_subscribe("newHeads")`, returning the subscription id.
    async fn subscribe_new_heads(&self) -> Result<String, RpcError>;

    /// Next pushed message, or `None` if the stream failed or was closed.
    async fn recv(&self) -> Option<Value>;

    async fn net_version(&self) -> Result<String, RpcError> {
        let value = self.request("net_version", json!([])).await?;
        match value {
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        let value = self.request("eth_chainId", json!([])).await?;
        Ok(parse_hex_u64(expect_str(&value, "eth_chainId")?)?)
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        let value = self.request("eth_blockNumber", json!([])).await?;
        Ok(parse_hex_u64(expect_str(&value, "eth_blockNumber")?)?)
    }

    /// Full block including transaction bodies.
    async fn block_by_hash(&self, hash: &str) -> Result<Block, RpcError> {
        let value = self.request("eth_getBlockByHash", json!([hash, true])).await?;
        if value.is_null() {
            return Err(RpcError::ParseError(format!("block {} not found", hash)));
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError> {
        let value = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if value.is_null() {
            return Err(RpcError::ParseError(format!("receipt {} not found", tx_hash)));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Deployed bytecode at `address` (latest state), hex encoded.
    async fn code_at(&self, address: &Address) -> Result<String, RpcError> {
        let value = self
            .request("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        Ok(expect_str(&value, "eth_getCode")?.to_string())
    }

    /// Read-only contract call against latest state, returning raw hex output.
    async fn call(&self, to: &Address, data: &str) -> Result<String, RpcError> {
        let value = self
            .request(
                "eth_call",
                json!([{"to": to.to_string(), "data": data}, "latest"]),
            )
            .await?;
        Ok(expect_str(&value, "eth_call")?.to_string())
    }
}

fn expect_str<'a>(value: &'a Value, method: &str) -> Result<&'a str, RpcError> {
    value
        .as_str()
        .ok_or_else(|| RpcError::ParseError(format!("{}: expected string result, got {}", method, value)))
}
