//! Contract bytecode existence cache.

use chainwatch_core::Address;
use chainwatch_feeds::BlockStreamSource;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Remembers whether an address has deployed code.
///
/// Only answered lookups are cached; an RPC failure reports "not a contract"
/// for that call and is retried next time.
pub struct ContractCodeCache {
    source: Arc<dyn BlockStreamSource>,
    entries: DashMap<Address, (bool, Instant)>,
    ttl: Duration,
}

impl ContractCodeCache {
    pub fn new(source: Arc<dyn BlockStreamSource>, ttl: Duration) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            ttl,
        }
    }

    pub async fn is_contract(&self, address: &Address) -> bool {
        if let Some(entry) = self.entries.get(address) {
            let (has_code, at) = *entry;
            if at.elapsed() < self.ttl {
                return has_code;
            }
        }

        match self.source.code_at(address).await {
            Ok(code) => {
                let has_code = !matches!(code.as_str(), "" | "0x" | "0x0");
                self.entries.insert(*address, (has_code, Instant::now()));
                has_code
            }
            Err(e) => {
                debug!("eth_getCode for {} failed: {}", address, e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
