//! Token transfer records and flow breaches.

use crate::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized ERC-20 `Transfer` observed in a transaction receipt.
///
/// `timestamp` is the block time in unix seconds; the extractor leaves it at
/// zero and the ingestion loop stamps it once the block is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub timestamp: u64,
    pub sender: Address,
    pub receiver: Address,
    pub token: Address,
    /// Amount in human units (already divided by `10^decimals`).
    pub amount: Decimal,
}

impl TransferEvent {
    /// Copy of this event stamped with a block timestamp.
    #[inline]
    pub fn at(self, timestamp: u64) -> Self {
        Self { timestamp, ..self }
    }
}

/// One processed contract-call transaction that moved monitored tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub timestamp: u64,
    pub tx_hash: String,
    pub from: Address,
    /// The called contract.
    pub to: Address,
    /// Per-token sum of all monitored transfers in the transaction.
    pub token_amounts: HashMap<Address, Decimal>,
}

impl TxRecord {
    /// Build a record summing the amounts of `events` per token.
    pub fn from_events(
        timestamp: u64,
        tx_hash: impl Into<String>,
        from: Address,
        to: Address,
        events: &[TransferEvent],
    ) -> Self {
        let mut token_amounts: HashMap<Address, Decimal> = HashMap::new();
        for ev in events {
            let sum = token_amounts.entry(ev.token).or_default();
            *sum = sum.saturating_add(ev.amount);
        }
        Self {
            timestamp,
            tx_hash: tx_hash.into(),
            from,
            to,
            token_amounts,
        }
    }
}

/// Which side of a transfer an accumulated flow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowRole {
    Sender,
    Receiver,
}

impl FlowRole {
    pub fn as_str(self) -> &'static str {
        match self {
            FlowRole::Sender => "sender",
            FlowRole::Receiver => "receiver",
        }
    }
}

impl std::fmt::Display for FlowRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accumulated (role, address, token) flow that met its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breach {
    pub role: FlowRole,
    pub address: Address,
    pub token: Address,
    pub amount: Decimal,
    pub threshold: Decimal,
}

/// Monitored tokens and their whale thresholds in human units.
///
/// Immutable once built; lookups are by address, so configuration keys are
/// effectively case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenThresholds(HashMap<Address, Decimal>);

impl TokenThresholds {
    pub fn new(thresholds: HashMap<Address, Decimal>) -> Self {
        Self(thresholds)
    }

    #[inline]
    pub fn is_monitored(&self, token: &Address) -> bool {
        self.0.contains_key(token)
    }

    #[inline]
    pub fn threshold_for(&self, token: &Address) -> Option<Decimal> {
        self.0.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Decimal)> {
        self.0.iter()
    }
}

impl FromIterator<(Address, Decimal)> for TokenThresholds {
    fn from_iter<I: IntoIterator<Item = (Address, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
