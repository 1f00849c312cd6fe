//! Block ingestion loop.
//!
//! `HotWalletMonitor` subscribes to new heads, and for every block:
//! 1. fetches the full block,
//! 2. prepares each contract-call transaction concurrently (code check,
//!    receipt fetch, transfer extraction), keeping block order,
//! 3. feeds the results to the aggregator one transaction at a time:
//!    `add`, `compute` at block time, `maybe_alert` at wall-clock time.
//!
//! The loop owns the aggregator, so window and cooldown state is only ever
//! touched from one task. A dropped stream is handled here by sleeping,
//! closing, reconnecting and re-subscribing; the transport never reconnects
//! on its own.

use crate::{
    ContractCodeCache, MonitorConfig, MonitorError, TokenMetadataCache, TransferEventExtractor,
    WindowedFlowAggregator,
};
use chainwatch_core::{AlertSink, Address, Chain, TransferEvent, TxRecord};
use chainwatch_feeds::{BlockStreamSource, RpcError, SubscriptionNotification, Transaction};
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A transaction ready to be fed to the aggregator.
struct PreparedTx {
    hash: String,
    from: Address,
    to: Address,
    events: Vec<TransferEvent>,
}

/// Watches contract calls for hot-wallet sized token flows.
pub struct HotWalletMonitor {
    source: Arc<dyn BlockStreamSource>,
    sink: Arc<dyn AlertSink>,
    config: MonitorConfig,
    metadata: TokenMetadataCache,
    code: ContractCodeCache,
    running: AtomicBool,
}

impl HotWalletMonitor {
    pub fn new(
        source: Arc<dyn BlockStreamSource>,
        sink: Arc<dyn AlertSink>,
        config: MonitorConfig,
    ) -> Self {
        let metadata =
            TokenMetadataCache::new(source.clone(), config.metadata_ttl, config.metadata_timeout);
        let code = ContractCodeCache::new(source.clone(), config.code_cache_ttl);
        Self {
            source,
            sink,
            config,
            metadata,
            code,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until `stop` is called.
    ///
    /// Only the initial liveness check and subscription can fail; everything
    /// after that is logged and retried. With no tokens configured this logs a
    /// warning and returns immediately.
    pub async fn start(&self) -> Result<(), MonitorError> {
        info!(
            "[HOT WALLET] Starting monitor: {} tokens, cooldown {} min, windows {:?}s",
            self.config.tokens.len(),
            self.config.alert_cooldown.as_secs() / 60,
            self.config.windows_secs
        );
        if self.config.tokens.is_empty() {
            warn!("[HOT WALLET] No tokens configured for monitoring");
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);

        if let Err(e) = self.check_liveness().await {
            error!("[HOT WALLET] Connection failed: {}", e);
            self.running.store(false, Ordering::SeqCst);
            return Err(MonitorError::Connect(e));
        }
        let mut sub_id = match self.source.subscribe_new_heads().await {
            Ok(id) => id,
            Err(e) => {
                error!("[HOT WALLET] Failed to subscribe: {}", e);
                self.running.store(false, Ordering::SeqCst);
                return Err(MonitorError::Subscribe(e));
            }
        };
        info!("[HOT WALLET] Subscribed to newHeads: {}", sub_id);

        let mut aggregator = WindowedFlowAggregator::new(
            self.config.tokens.clone(),
            &self.config.windows_secs,
            self.config.alert_cooldown,
        );
        let mut blocks_seen: u64 = 0;
        let mut last_hash: Option<String> = None;

        while self.is_running() {
            let message = match self.source.recv().await {
                Some(message) if !message.is_null() => message,
                _ => {
                    if !self.is_running() {
                        break;
                    }
                    warn!("[HOT WALLET] Stream dropped, reconnecting...");
                    match self.reconnect().await {
                        Ok(Some(id)) => {
                            info!("[HOT WALLET] Re-subscribed: {}", id);
                            sub_id = id;
                        }
                        Ok(None) => {}
                        Err(e) => error!("[HOT WALLET] Re-subscribe failed: {}", e),
                    }
                    continue;
                }
            };

            let Some(notification) = SubscriptionNotification::for_subscription(&message, &sub_id)
            else {
                continue;
            };
            let Some(hash) = notification.block_hash() else {
                debug!("newHeads notification without hash");
                continue;
            };
            if last_hash.as_deref() == Some(hash) {
                debug!("Skipping duplicate block {}", hash);
                continue;
            }

            if self.process_block(&mut aggregator, hash, blocks_seen + 1).await {
                blocks_seen += 1;
                last_hash = Some(hash.to_string());
            }
        }

        // A reconnect racing with stop() may have reopened the stream.
        self.source.close().await;
        info!("[HOT WALLET] Monitor stopped after {} blocks", blocks_seen);
        Ok(())
    }

    /// Ask the loop to exit and close the stream. The block in flight finishes first.
    pub async fn stop(&self) {
        info!("[HOT WALLET] Stopping monitor");
        self.running.store(false, Ordering::SeqCst);
        self.source.close().await;
    }

    async fn check_liveness(&self) -> Result<(), RpcError> {
        self.source.connect().await?;
        let net_version = self.source.net_version().await?;
        let chain_id = self.source.chain_id().await?;
        let latest = self.source.block_number().await?;
        info!(
            "[HOT WALLET] Connected. net_version={}, chain_id={}, latest_block={}",
            net_version,
            Chain::describe(chain_id),
            latest
        );
        Ok(())
    }

    /// Returns `None` when the monitor was stopped during the delay.
    async fn reconnect(&self) -> Result<Option<String>, RpcError> {
        tokio::time::sleep(self.config.reconnect_delay).await;
        if !self.is_running() {
            return Ok(None);
        }
        self.source.close().await;
        self.source.connect().await?;
        self.source.subscribe_new_heads().await.map(Some)
    }

    /// Returns false when the block could not be fetched, so a re-delivered
    /// head with the same hash is retried.
    async fn process_block(&self, aggregator: &mut WindowedFlowAggregator, hash: &str, blocks_seen: u64) -> bool {
        let started = Instant::now();
        let block = match self.source.block_by_hash(hash).await {
            Ok(block) => block,
            Err(e) => {
                error!("[HOT WALLET] Error fetching block {}: {}", hash, e);
                return false;
            }
        };
        let (number, timestamp) = match (block.number(), block.timestamp()) {
            (Ok(number), Ok(timestamp)) => (number, timestamp),
            (Err(e), _) | (_, Err(e)) => {
                error!("[HOT WALLET] Malformed block header {}: {}", hash, e);
                return false;
            }
        };

        let txs: Vec<Transaction> = block.transactions().flatten().collect();
        debug!("[HOT WALLET] Block #{} txs={}", number, block.transactions.len());

        let prepared: Vec<Option<PreparedTx>> = stream::iter(txs)
            .map(|tx| self.prepare_tx(tx))
            .buffered(self.config.receipt_concurrency.max(1))
            .collect()
            .await;

        let mut processed = 0usize;
        for tx in prepared.into_iter().flatten() {
            let events: Vec<TransferEvent> = tx.events.iter().map(|e| e.at(timestamp)).collect();
            let record = TxRecord::from_events(timestamp, tx.hash, tx.from, tx.to, &events);
            aggregator.add(tx.to, record, &events);

            let flows = aggregator.compute(&tx.to, timestamp);
            aggregator
                .maybe_alert(&tx.to, &flows, wall_clock_secs(), self.sink.as_ref(), &self.metadata)
                .await;
            processed += 1;
        }

        debug!(
            "[HOT WALLET] Block #{} processed {}/{} txs in {:.1}ms",
            number,
            processed,
            block.transactions.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        let every = self.config.heartbeat_every_blocks;
        if every > 0 && blocks_seen % every == 0 {
            info!(
                "[HOT WALLET] Heartbeat: blocks_seen={}, latest=#{}, contracts={}",
                blocks_seen,
                number,
                aggregator.tracked_contracts()
            );
        }
        true
    }

    /// Everything for one transaction that needs the network.
    async fn prepare_tx(&self, tx: Transaction) -> Option<PreparedTx> {
        let from = Address::parse_opt(tx.from.as_deref())?;
        let to = Address::parse_opt(tx.to.as_deref())?;
        if !self.code.is_contract(&to).await {
            return None;
        }

        let receipt = match self.source.transaction_receipt(&tx.hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                debug!("Receipt for {} unavailable: {}", tx.hash, e);
                return None;
            }
        };

        let events = TransferEventExtractor::new(&self.config.tokens, &self.metadata)
            .extract(&receipt)
            .await;
        if events.is_empty() {
            return None;
        }

        Some(PreparedTx {
            hash: tx.hash,
            from,
            to,
            events,
        })
    }
}

fn wall_clock_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
