//! JSON-RPC wire types.
//!
//! Requests and responses for the generic call path, the `eth_subscription`
//! notification envelope, and the subset of block / transaction / receipt
//! fields the monitor reads. Transactions and logs are kept as raw JSON on
//! their containers so that one malformed entry can be skipped without
//! rejecting the whole block or receipt.

use crate::RpcError;
use chainwatch_core::parse_hex_u64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outgoing JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// A message read off the socket, classified by shape.
#[derive(Debug)]
pub enum Incoming {
    /// Reply to a request we sent.
    Response {
        id: u64,
        outcome: Result<Value, RpcError>,
    },
    /// Anything without a numeric id, e.g. subscription pushes.
    Notification(Value),
}

impl Incoming {
    /// Classify a decoded JSON message.
    pub fn classify(mut value: Value) -> Self {
        let Some(id) = value.get("id").and_then(Value::as_u64) else {
            return Incoming::Notification(value);
        };

        let outcome = match value.get_mut("error").map(Value::take) {
            Some(err) if !err.is_null() => match serde_json::from_value::<JsonRpcErrorObject>(err) {
                Ok(obj) => Err(RpcError::Rpc {
                    code: obj.code,
                    message: obj.message,
                }),
                Err(e) => Err(RpcError::ParseError(format!("malformed error object: {}", e))),
            },
            _ => Ok(value
                .get_mut("result")
                .map(Value::take)
                .unwrap_or(Value::Null)),
        };

        Incoming::Response { id, outcome }
    }
}

/// `eth_subscription` push envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionNotification {
    pub method: String,
    pub params: SubscriptionParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionParams {
    pub subscription: String,
    pub result: Value,
}

impl SubscriptionNotification {
    /// Parse `value` as a notification for `subscription_id`.
    ///
    /// Returns `None` for anything else: other methods, other subscriptions,
    /// or payloads that do not have the envelope shape.
    pub fn for_subscription(value: &Value, subscription_id: &str) -> Option<Self> {
        let notification = Self::deserialize(value).ok()?;
        if notification.method != "eth_subscription"
            || notification.params.subscription != subscription_id
        {
            return None;
        }
        Some(notification)
    }

    /// Block hash carried by a `newHeads` notification.
    pub fn block_hash(&self) -> Option<&str> {
        self.params
            .result
            .get("hash")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
    }
}

/// Block returned by `eth_getBlockByHash(hash, true)`.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub hash: Option<String>,
    pub number: String,
    pub timestamp: String,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

impl Block {
    pub fn number(&self) -> Result<u64, RpcError> {
        Ok(parse_hex_u64(&self.number)?)
    }

    pub fn timestamp(&self) -> Result<u64, RpcError> {
        Ok(parse_hex_u64(&self.timestamp)?)
    }

    /// Decoded transactions; entries that do not decode are `None`.
    pub fn transactions(&self) -> impl Iterator<Item = Option<Transaction>> + '_ {
        self.transactions
            .iter()
            .map(|tx| Transaction::deserialize(tx).ok())
    }
}

/// Transaction body as embedded in a full block.
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub hash: String,
    #[serde(default)]
    pub from: Option<String>,
    /// `None` for contract creation.
    #[serde(default)]
    pub to: Option<String>,
}

/// Result of `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionReceipt {
    #[serde(default, rename = "transactionHash")]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl TransactionReceipt {
    /// Decoded log entries; each entry decodes independently.
    pub fn logs(&self) -> impl Iterator<Item = Result<Log, serde_json::Error>> + '_ {
        self.logs.iter().map(Log::deserialize)
    }
}

/// Event log entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    /// Emitting contract.
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!(["0xabc", true]);
        let req = JsonRpcRequest::new(7, "eth_getBlockByHash", &params);
        let text = serde_json::to_string(&req).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            back,
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_getBlockByHash", "params": ["0xabc", true]})
        );
    }

    #[test]
    fn test_classify_result() {
        let msg = json!({"jsonrpc": "2.0", "id": 3, "result": "0x89"});
        match Incoming::classify(msg) {
            Incoming::Response { id, outcome } => {
                assert_eq!(id, 3);
                assert_eq!(outcome.unwrap(), json!("0x89"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_null_result() {
        let msg = json!({"jsonrpc": "2.0", "id": 4, "result": null});
        let Incoming::Response { outcome, .. } = Incoming::classify(msg) else {
            panic!("expected response");
        };
        assert_eq!(outcome.unwrap(), Value::Null);
    }

    #[test]
    fn test_classify_error() {
        let msg = json!({"jsonrpc": "2.0", "id": 5, "error": {"code": 3, "message": "execution reverted"}});
        let Incoming::Response { outcome, .. } = Incoming::classify(msg) else {
            panic!("expected response");
        };
        assert!(matches!(outcome, Err(RpcError::Rpc { code: 3, .. })));
    }

    #[test]
    fn test_classify_notification() {
        let msg = json!({"jsonrpc": "2.0", "method": "eth_subscription", "params": {"subscription": "0x1", "result": {}}});
        assert!(matches!(Incoming::classify(msg), Incoming::Notification(_)));
    }

    #[test]
    fn test_subscription_filtering() {
        let msg = json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {"subscription": "0xsub", "result": {"hash": "0xblock", "number": "0x10"}}
        });
        let n = SubscriptionNotification::for_subscription(&msg, "0xsub").unwrap();
        assert_eq!(n.block_hash(), Some("0xblock"));

        assert!(SubscriptionNotification::for_subscription(&msg, "0xother").is_none());

        let wrong_method = json!({"method": "eth_foo", "params": {"subscription": "0xsub", "result": {}}});
        assert!(SubscriptionNotification::for_subscription(&wrong_method, "0xsub").is_none());
        assert!(SubscriptionNotification::for_subscription(&json!({"id": 1}), "0xsub").is_none());
    }

    #[test]
    fn test_block_decoding_skips_bad_transactions() {
        let block: Block = serde_json::from_value(json!({
            "hash": "0xb",
            "number": "0x10",
            "timestamp": "0x6553f100",
            "transactions": [
                {"hash": "0x1", "from": "0xaa", "to": "0xbb"},
                {"hash": 42},
                {"hash": "0x2", "from": "0xaa", "to": null}
            ]
        }))
        .unwrap();

        assert_eq!(block.number().unwrap(), 16);
        assert_eq!(block.timestamp().unwrap(), 1_700_000_000);
        let txs: Vec<_> = block.transactions().collect();
        assert_eq!(txs.len(), 3);
        assert!(txs[0].is_some());
        assert!(txs[1].is_none());
        assert_eq!(txs[2].as_ref().unwrap().to, None);
    }

    #[test]
    fn test_receipt_logs_decode_independently() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0x1",
            "logs": [
                {"address": "0xaa", "topics": ["0x01"], "data": "0x"},
                {"address": 5}
            ]
        }))
        .unwrap();
        let logs: Vec<_> = receipt.logs().collect();
        assert!(logs[0].is_ok());
        assert!(logs[1].is_err());
    }
}
