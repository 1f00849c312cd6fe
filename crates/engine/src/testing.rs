//! Scripted collaborators for engine tests.

use async_trait::async_trait;
use chainwatch_core::{AlertError, AlertSink};
use chainwatch_feeds::{BlockStreamSource, RpcError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

pub const SUB_ID: &str = "0xsub";

#[derive(Clone)]
enum Reply {
    Ok(Value),
    Err(i64, String),
}

/// In-memory node.
///
/// `recv` replays a script (`None` entries simulate a dropped stream) and then
/// parks until `close` is called. Replies are looked up by the most specific
/// key first: `eth_call:<to>:<data>`, `<method>:<first param>`, `<method>`.
pub struct MockSource {
    script: Mutex<VecDeque<Option<Value>>>,
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
    closed: AtomicBool,
    close_signal: Notify,
    pub connects: AtomicUsize,
    pub subscribes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        let source = Self {
            script: Mutex::new(VecDeque::new()),
            replies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            connects: AtomicUsize::new(0),
            subscribes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        };
        source.reply("net_version", json!("137"));
        source.reply("eth_chainId", json!("0x89"));
        source.reply("eth_blockNumber", json!("0x10"));
        source
    }

    pub fn reply(&self, key: impl Into<String>, value: Value) {
        self.replies.lock().unwrap().insert(key.into(), Reply::Ok(value));
    }

    pub fn fail(&self, key: impl Into<String>, code: i64, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(key.into(), Reply::Err(code, message.to_string()));
    }

    pub fn push(&self, message: Option<Value>) {
        self.script.lock().unwrap().push_back(message);
    }

    /// Queue a `newHeads` notification for the active subscription.
    pub fn push_head(&self, block_hash: &str) {
        self.push(Some(json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {"subscription": SUB_ID, "result": {"hash": block_hash}}
        })));
    }

    /// Number of requests whose key (see type docs) starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn keys(method: &str, params: &Value) -> Vec<String> {
        let mut keys = Vec::new();
        match params.get(0) {
            Some(Value::Object(call)) => {
                let to = call.get("to").and_then(Value::as_str).unwrap_or_default();
                let data = call.get("data").and_then(Value::as_str).unwrap_or_default();
                keys.push(format!("{}:{}:{}", method, to, data));
            }
            Some(Value::String(first)) => keys.push(format!("{}:{}", method, first)),
            _ => {}
        }
        keys.push(method.to_string());
        keys
    }
}

#[async_trait]
impl BlockStreamSource for MockSource {
    async fn connect(&self) -> Result<(), RpcError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.close_signal.notify_waiters();
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let keys = Self::keys(method, &params);
        self.requests.lock().unwrap().push(keys[0].clone());
        let reply = {
            let replies = self.replies.lock().unwrap();
            keys.iter().find_map(|k| replies.get(k).cloned())
        };
        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Err(code, message)) => Err(RpcError::Rpc { code, message }),
            None => Err(RpcError::Rpc {
                code: -32601,
                message: format!("no reply scripted for {}", keys[0]),
            }),
        }
    }

    async fn subscribe_new_heads(&self) -> Result<String, RpcError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        Ok(SUB_ID.to_string())
    }

    async fn recv(&self) -> Option<Value> {
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        loop {
            let notified = self.close_signal.notified();
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }
}

/// Sink that records every message it accepts, or rejects everything.
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
    pub attempts: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AlertError::Delivery("scripted failure".into()));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// `0x` + 64 hex digit word holding `value`.
pub fn word(value: u128) -> String {
    format!("0x{:064x}", value)
}

/// Topic form of an address (left-padded to 32 bytes).
pub fn topic(address: &chainwatch_core::Address) -> String {
    format!("0x{:0>64}", hex::encode(address.as_bytes()))
}
