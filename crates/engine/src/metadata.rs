//! ERC-20 token metadata cache.
//!
//! `decimals()` and `symbol()` are resolved with read-only calls against the
//! latest state and cached per token address for a fixed TTL. Lookups never
//! fail: a broken or non-standard token resolves to 18 decimals and the
//! symbol `UNKNOWN`, and those fallbacks are not cached so the next access
//! retries the live call.

use chainwatch_core::Address;
use chainwatch_feeds::{BlockStreamSource, RpcError};
use compact_str::CompactString;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// `decimals()` selector.
pub const DECIMALS_SELECTOR: &str = "0x313ce567";
/// `symbol()` selector.
pub const SYMBOL_SELECTOR: &str = "0x95d89b41";

pub const DEFAULT_DECIMALS: u32 = 18;
pub const MAX_DECIMALS: u32 = 36;
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";

const WORD: usize = 32;

#[derive(Debug, Clone)]
struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

/// Per-token decimals and symbol, shared between concurrent lookups.
///
/// Two tasks missing the same key at once both fetch; the later insert wins.
pub struct TokenMetadataCache {
    source: Arc<dyn BlockStreamSource>,
    decimals: DashMap<Address, Cached<u32>>,
    symbols: DashMap<Address, Cached<CompactString>>,
    ttl: Duration,
    call_timeout: Duration,
}

impl TokenMetadataCache {
    pub fn new(source: Arc<dyn BlockStreamSource>, ttl: Duration, call_timeout: Duration) -> Self {
        Self {
            source,
            decimals: DashMap::new(),
            symbols: DashMap::new(),
            ttl,
            call_timeout,
        }
    }

    /// Token decimals, or 18 when the token does not answer sensibly.
    pub async fn decimals(&self, token: &Address) -> u32 {
        if let Some(value) = fresh(&self.decimals, token, self.ttl) {
            return value;
        }

        let outcome = self.call(token, DECIMALS_SELECTOR).await.and_then(|raw| {
            parse_decimals(&raw).ok_or_else(|| RpcError::ParseError(format!("bad decimals: {}", raw)))
        });
        match outcome {
            Ok(value) => {
                self.decimals.insert(
                    *token,
                    Cached {
                        value,
                        fetched_at: Instant::now(),
                    },
                );
                value
            }
            Err(e) => {
                debug!("decimals() for {} failed, using {}: {}", token, DEFAULT_DECIMALS, e);
                DEFAULT_DECIMALS
            }
        }
    }

    /// Token symbol, or `UNKNOWN`.
    pub async fn symbol(&self, token: &Address) -> CompactString {
        if let Some(value) = fresh(&self.symbols, token, self.ttl) {
            return value;
        }

        let outcome = self.call(token, SYMBOL_SELECTOR).await.and_then(|raw| {
            parse_symbol(&raw).ok_or_else(|| RpcError::ParseError(format!("bad symbol: {}", raw)))
        });
        match outcome {
            Ok(value) => {
                self.symbols.insert(
                    *token,
                    Cached {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                value
            }
            Err(e) => {
                debug!("symbol() for {} failed: {}", token, e);
                CompactString::new(UNKNOWN_SYMBOL)
            }
        }
    }

    /// Number of cached (decimals, symbol) entries.
    pub fn cached_counts(&self) -> (usize, usize) {
        (self.decimals.len(), self.symbols.len())
    }

    async fn call(&self, token: &Address, selector: &str) -> Result<String, RpcError> {
        tokio::time::timeout(self.call_timeout, self.source.call(token, selector))
            .await
            .map_err(|_| RpcError::Timeout(format!("eth_call {} on {}", selector, token)))?
    }
}

fn fresh<T: Clone>(map: &DashMap<Address, Cached<T>>, key: &Address, ttl: Duration) -> Option<T> {
    let expired = match map.get(key) {
        Some(entry) if entry.fetched_at.elapsed() < ttl => return Some(entry.value.clone()),
        Some(_) => true,
        None => false,
    };
    if expired {
        map.remove(key);
    }
    None
}

/// Last 32-byte word of the return data, accepted only within `0..=36`.
fn parse_decimals(raw: &str) -> Option<u32> {
    let data = hex::decode(raw.strip_prefix("0x")?).ok()?;
    let at = data.len().checked_sub(WORD)?;
    let value = read_word_usize(&data, at)?;
    u32::try_from(value).ok().filter(|d| *d <= MAX_DECIMALS)
}

/// Decode `string` (offset, length, bytes) or legacy `bytes32` return data.
fn parse_symbol(raw: &str) -> Option<CompactString> {
    let data = hex::decode(raw.strip_prefix("0x")?).ok()?;
    if data.len() < WORD {
        return None;
    }

    let dynamic = if data.len() >= 2 * WORD {
        read_word_usize(&data, 0)
            .filter(|offset| *offset > 0 && *offset < data.len())
            .map(|offset| {
                let len = read_word_usize(&data, offset)?;
                let start = offset.checked_add(WORD)?;
                let end = start.checked_add(len)?.min(data.len());
                data.get(start..end)
            })
    } else {
        None
    };

    let bytes = match dynamic {
        Some(inner) => inner?,
        None => &data[..WORD],
    };

    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let symbol = text.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(CompactString::new(symbol))
    }
}

/// Big-endian word at `at` as a `usize`, if it fits.
fn read_word_usize(data: &[u8], at: usize) -> Option<usize> {
    let word = data.get(at..at.checked_add(WORD)?)?;
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(low);
    usize::try_from(u64::from_be_bytes(buf)).ok()
}
