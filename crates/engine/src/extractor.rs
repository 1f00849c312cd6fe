//! ERC-20 `Transfer` extraction from transaction receipts.

use crate::{ExtractError, TokenMetadataCache};
use chainwatch_core::{decode_uint256, to_human_units, Address, TokenThresholds, TransferEvent};
use chainwatch_feeds::{Log, TransactionReceipt};
use tracing::debug;

/// `keccak256("Transfer(address,address,uint256)")`.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Turns receipt logs into monitored-token transfers.
pub struct TransferEventExtractor<'a> {
    tokens: &'a TokenThresholds,
    metadata: &'a TokenMetadataCache,
}

impl<'a> TransferEventExtractor<'a> {
    pub fn new(tokens: &'a TokenThresholds, metadata: &'a TokenMetadataCache) -> Self {
        Self { tokens, metadata }
    }

    /// Every qualifying transfer in the receipt, in log order, with
    /// `timestamp` left at 0. Entries that fail to decode are skipped.
    pub async fn extract(&self, receipt: &TransactionReceipt) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        for entry in receipt.logs() {
            let log = match entry {
                Ok(log) => log,
                Err(e) => {
                    debug!("Skipping undecodable log: {}", e);
                    continue;
                }
            };
            match self.extract_log(&log).await {
                Ok(event) => events.push(event),
                Err(ExtractError::NotTransfer) | Err(ExtractError::Unmonitored(_)) => {}
                Err(e) => debug!(token = %log.address, "Skipping Transfer log: {}", e),
            }
        }
        events
    }

    async fn extract_log(&self, log: &Log) -> Result<TransferEvent, ExtractError> {
        let is_transfer = log
            .topics
            .first()
            .is_some_and(|t| t.eq_ignore_ascii_case(TRANSFER_TOPIC));
        if !is_transfer {
            return Err(ExtractError::NotTransfer);
        }

        let token: Address = log
            .address
            .parse()
            .map_err(|_| ExtractError::BadToken(log.address.clone()))?;
        if !self.tokens.is_monitored(&token) {
            return Err(ExtractError::Unmonitored(log.address.clone()));
        }

        let sender = topic_address(log, 1, "sender")?;
        let receiver = topic_address(log, 2, "receiver")?;

        let raw = decode_uint256(&log.data)?;
        let decimals = self.metadata.decimals(&token).await;
        let amount = to_human_units(raw, decimals).ok_or(ExtractError::AmountRange(decimals))?;

        Ok(TransferEvent {
            timestamp: 0,
            sender,
            receiver,
            token,
            amount,
        })
    }
}

fn topic_address(log: &Log, index: usize, side: &'static str) -> Result<Address, ExtractError> {
    let address = log
        .topics
        .get(index)
        .and_then(|t| Address::from_topic(t))
        .ok_or(ExtractError::BadTopic(side))?;
    if address.is_placeholder() {
        return Err(ExtractError::Placeholder(side));
    }
    Ok(address)
}
