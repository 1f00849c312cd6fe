//! Per-contract rolling flow windows.
//!
//! Every contract that receives a qualifying transaction gets one buffer per
//! configured window length. Buffers are append-only at the back and pruned
//! from the front, so they stay sorted by block time as long as blocks are fed
//! in order. Sums are recomputed from the buffered events on each `compute`.
//!
//! All mutation happens from the ingestion loop's single task; the aggregator
//! is plain owned state with no interior locking.

use crate::TokenMetadataCache;
use chainwatch_core::{AlertSink, Address, Breach, FlowRole, TokenThresholds, TransferEvent, TxRecord};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Breach lines included in a single alert message.
pub const MAX_ALERT_LINES: usize = 12;

/// Sums per address, then per token.
pub type FlowSums = BTreeMap<Address, BTreeMap<Address, Decimal>>;

#[derive(Debug)]
struct WindowBuffer {
    length_secs: u64,
    records: VecDeque<Arc<TxRecord>>,
    events: VecDeque<TransferEvent>,
}

impl WindowBuffer {
    fn new(length_secs: u64) -> Self {
        Self {
            length_secs,
            records: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Drop entries with `timestamp <= now - length`.
    fn prune(&mut self, now: u64) {
        let length = self.length_secs;
        let expired = |ts: u64| ts.saturating_add(length) <= now;
        while self.records.front().is_some_and(|r| expired(r.timestamp)) {
            self.records.pop_front();
        }
        while self.events.front().is_some_and(|e| expired(e.timestamp)) {
            self.events.pop_front();
        }
    }
}

#[derive(Debug)]
struct ContractWindowState {
    windows: Vec<WindowBuffer>,
}

/// Flow totals and breaches for one window length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFlow {
    pub window_secs: u64,
    pub sender_sums: FlowSums,
    pub receiver_sums: FlowSums,
    /// Senders first, then receivers; each ordered by address then token.
    pub breaches: Vec<Breach>,
}

impl WindowFlow {
    pub fn sender_sum(&self, sender: &Address, token: &Address) -> Option<Decimal> {
        self.sender_sums.get(sender)?.get(token).copied()
    }

    pub fn receiver_sum(&self, receiver: &Address, token: &Address) -> Option<Decimal> {
        self.receiver_sums.get(receiver)?.get(token).copied()
    }
}

/// What `maybe_alert` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Nothing crossed a threshold.
    NoBreach,
    /// Breaches found, but the contract alerted too recently.
    CoolingDown { remaining_secs: u64 },
    /// Alert accepted by the sink; cooldown restarted.
    Dispatched { breaches: usize },
    /// The sink rejected the alert; cooldown untouched.
    Failed,
}

/// Windowed per-contract flow accumulation with threshold and cooldown gating.
#[derive(Debug)]
pub struct WindowedFlowAggregator {
    windows_secs: Vec<u64>,
    tokens: TokenThresholds,
    contracts: HashMap<Address, ContractWindowState>,
    cooldowns: HashMap<Address, u64>,
    cooldown_secs: u64,
}

impl WindowedFlowAggregator {
    pub fn new(tokens: TokenThresholds, windows_secs: &[u64], cooldown: Duration) -> Self {
        let mut windows_secs = windows_secs.to_vec();
        windows_secs.sort_unstable();
        windows_secs.dedup();
        Self {
            windows_secs,
            tokens,
            contracts: HashMap::new(),
            cooldowns: HashMap::new(),
            cooldown_secs: cooldown.as_secs(),
        }
    }

    pub fn windows_secs(&self) -> &[u64] {
        &self.windows_secs
    }

    /// Contracts with window state.
    pub fn tracked_contracts(&self) -> usize {
        self.contracts.len()
    }

    /// Buffered (records, events) for `contract` in the given window.
    pub fn buffered(&self, contract: &Address, window_secs: u64) -> Option<(usize, usize)> {
        self.contracts
            .get(contract)?
            .windows
            .iter()
            .find(|w| w.length_secs == window_secs)
            .map(|w| (w.records.len(), w.events.len()))
    }

    /// Append one transaction and its transfers to every window of `contract`.
    pub fn add(&mut self, contract: Address, record: TxRecord, events: &[TransferEvent]) {
        let windows_secs = &self.windows_secs;
        let state = self
            .contracts
            .entry(contract)
            .or_insert_with(|| ContractWindowState {
                windows: windows_secs.iter().map(|w| WindowBuffer::new(*w)).collect(),
            });

        let record = Arc::new(record);
        for window in &mut state.windows {
            window.records.push_back(record.clone());
            window.events.extend(events.iter().copied());
        }
    }

    /// Evict everything that has left its window as of `now`.
    pub fn prune(&mut self, contract: &Address, now: u64) {
        if let Some(state) = self.contracts.get_mut(contract) {
            for window in &mut state.windows {
                window.prune(now);
            }
        }
    }

    /// Prune, then sum flows per window and collect threshold breaches.
    ///
    /// Returns an empty breakdown for a contract that was never seen.
    pub fn compute(&mut self, contract: &Address, now: u64) -> Vec<WindowFlow> {
        self.prune(contract, now);
        let Some(state) = self.contracts.get(contract) else {
            return Vec::new();
        };

        state
            .windows
            .iter()
            .map(|window| {
                let mut sender_sums = FlowSums::new();
                let mut receiver_sums = FlowSums::new();
                for ev in window.events.iter().filter(|e| self.tokens.is_monitored(&e.token)) {
                    accumulate(&mut sender_sums, ev.sender, ev.token, ev.amount);
                    accumulate(&mut receiver_sums, ev.receiver, ev.token, ev.amount);
                }

                let mut breaches = Vec::new();
                self.collect_breaches(FlowRole::Sender, &sender_sums, &mut breaches);
                self.collect_breaches(FlowRole::Receiver, &receiver_sums, &mut breaches);

                WindowFlow {
                    window_secs: window.length_secs,
                    sender_sums,
                    receiver_sums,
                    breaches,
                }
            })
            .collect()
    }

    fn collect_breaches(&self, role: FlowRole, sums: &FlowSums, out: &mut Vec<Breach>) {
        for (address, per_token) in sums {
            for (token, amount) in per_token {
                let Some(threshold) = self.tokens.threshold_for(token) else {
                    continue;
                };
                if *amount >= threshold {
                    out.push(Breach {
                        role,
                        address: *address,
                        token: *token,
                        amount: *amount,
                        threshold,
                    });
                }
            }
        }
    }

    /// Seconds of cooldown left for `contract` at `now`, if any.
    pub fn cooldown_remaining(&self, contract: &Address, now: u64) -> Option<u64> {
        let last = self.cooldowns.get(contract)?;
        let elapsed = now.saturating_sub(*last);
        (elapsed < self.cooldown_secs).then(|| self.cooldown_secs - elapsed)
    }

    /// Dispatch one alert for the breaches in `breakdown` unless `contract`
    /// is cooling down. The cooldown restarts only when the sink accepts.
    pub async fn maybe_alert(
        &mut self,
        contract: &Address,
        breakdown: &[WindowFlow],
        now: u64,
        sink: &dyn AlertSink,
        metadata: &TokenMetadataCache,
    ) -> AlertOutcome {
        let mut hits: Vec<(u64, &Breach)> = breakdown
            .iter()
            .flat_map(|w| w.breaches.iter().map(move |b| (w.window_secs, b)))
            .collect();
        if hits.is_empty() {
            return AlertOutcome::NoBreach;
        }

        if let Some(remaining_secs) = self.cooldown_remaining(contract, now) {
            debug!("Skipping alert for {}: cooling down, {}s remaining", contract.short(), remaining_secs);
            return AlertOutcome::CoolingDown { remaining_secs };
        }

        hits.sort_by_key(|(w, b)| (*w, b.role, b.address, b.token));
        let message = format_alert(contract, &hits, metadata).await;
        warn!("[HOT WALLET ALERT] {}", message);

        match sink.send(&message).await {
            Ok(()) => {
                self.cooldowns.insert(*contract, now);
                info!(
                    "Alert cooldown set for {} until {}",
                    contract.short(),
                    now.saturating_add(self.cooldown_secs)
                );
                AlertOutcome::Dispatched { breaches: hits.len() }
            }
            Err(e) => {
                error!("Failed to send alert via {}: {}", sink.name(), e);
                AlertOutcome::Failed
            }
        }
    }
}

fn accumulate(sums: &mut FlowSums, address: Address, token: Address, amount: Decimal) {
    let total = sums.entry(address).or_default().entry(token).or_default();
    *total = total.saturating_add(amount);
}

async fn format_alert(contract: &Address, hits: &[(u64, &Breach)], metadata: &TokenMetadataCache) -> String {
    let mut message = format!("🐋 Hot Wallet Alert - Contract {}", contract);
    for (window_secs, breach) in hits.iter().take(MAX_ALERT_LINES) {
        let symbol = metadata.symbol(&breach.token).await;
        let _ = write!(
            message,
            "\n- {}s: {}={} token={}({}) window_sum={} thr={}",
            window_secs,
            breach.role,
            breach.address.short(),
            symbol,
            breach.token.short(),
            format_amount(breach.amount),
            format_amount(breach.threshold),
        );
    }
    message
}

/// Four decimal places with thousands separators: `1,234.5000`.
pub fn format_amount(amount: Decimal) -> String {
    let fixed = format!("{:.4}", amount.round_dp(4));
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, "0000"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSource, RecordingSink};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;

    const COOLDOWN: u64 = 3600;
    const T0: u64 = 1_700_000_000;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0x10;
        bytes[19] = n;
        Address::new(bytes)
    }

    fn token() -> Address {
        addr(0xee)
    }

    fn contract() -> Address {
        addr(0xcc)
    }

    fn aggregator() -> WindowedFlowAggregator {
        let tokens: TokenThresholds = [(token(), Decimal::from(1000))].into_iter().collect();
        WindowedFlowAggregator::new(tokens, &[60, 300], Duration::from_secs(COOLDOWN))
    }

    fn metadata() -> TokenMetadataCache {
        TokenMetadataCache::new(Arc::new(MockSource::new()), Duration::from_secs(60), Duration::from_secs(1))
    }

    fn transfer(ts: u64, sender: Address, receiver: Address, tok: Address, amount: i64) -> TransferEvent {
        TransferEvent {
            timestamp: ts,
            sender,
            receiver,
            token: tok,
            amount: Decimal::from(amount),
        }
    }

    fn add_tx(agg: &mut WindowedFlowAggregator, events: &[TransferEvent]) {
        let ts = events[0].timestamp;
        let record = TxRecord::from_events(ts, format!("0x{:x}", ts), addr(1), contract(), events);
        agg.add(contract(), record, events);
    }

    #[test]
    fn test_prune_is_exact_at_window_edge() {
        let mut agg = aggregator();
        for ts in [T0, T0 + 1, T0 + 30, T0 + 59, T0 + 60] {
            add_tx(&mut agg, &[transfer(ts, addr(1), contract(), token(), 1)]);
        }

        // At now = T0 + 60, the 60s window keeps ts > T0.
        agg.prune(&contract(), T0 + 60);
        assert_eq!(agg.buffered(&contract(), 60), Some((4, 4)));
        assert_eq!(agg.buffered(&contract(), 300), Some((5, 5)));

        agg.prune(&contract(), T0 + 119);
        assert_eq!(agg.buffered(&contract(), 60), Some((1, 1)));

        agg.prune(&contract(), T0 + 120);
        assert_eq!(agg.buffered(&contract(), 60), Some((0, 0)));
        assert_eq!(agg.buffered(&contract(), 300), Some((5, 5)));
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let mut agg = aggregator();
        add_tx(&mut agg, &[transfer(T0, addr(1), addr(2), token(), 999)]);
        let flows = agg.compute(&contract(), T0);
        assert!(flows.iter().all(|w| w.breaches.is_empty()));

        add_tx(&mut agg, &[transfer(T0 + 1, addr(1), addr(3), token(), 1)]);
        let flows = agg.compute(&contract(), T0 + 1);
        assert_eq!(flows[0].breaches.len(), 1);
        assert_eq!(flows[0].breaches[0].role, FlowRole::Sender);
        assert_eq!(flows[0].breaches[0].amount, Decimal::from(1000));
        assert_eq!(flows[0].breaches[0].threshold, Decimal::from(1000));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let mut agg = aggregator();
        add_tx(
            &mut agg,
            &[
                transfer(T0, addr(1), addr(2), token(), 700),
                transfer(T0, addr(3), addr(2), token(), 700),
            ],
        );
        let first = agg.compute(&contract(), T0 + 5);
        let second = agg.compute(&contract(), T0 + 5);
        assert_eq!(first, second);
        assert_eq!(first[0].receiver_sum(&addr(2), &token()), Some(Decimal::from(1400)));
        assert_eq!(first[0].breaches[0].role, FlowRole::Receiver);
    }

    #[test]
    fn test_unmonitored_token_never_summed() {
        let mut agg = aggregator();
        let stray = addr(0xdd);
        add_tx(&mut agg, &[transfer(T0, addr(1), addr(2), stray, 1_000_000)]);
        let flows = agg.compute(&contract(), T0);
        assert!(flows.iter().all(|w| w.sender_sums.is_empty() && w.receiver_sums.is_empty()));
    }

    #[test]
    fn test_unknown_contract_has_empty_breakdown() {
        let mut agg = aggregator();
        assert!(agg.compute(&addr(0x99), T0).is_empty());
        assert_eq!(agg.tracked_contracts(), 0);
    }

    #[tokio::test]
    async fn test_three_transfers_breach_once_then_cooldown() {
        let mut agg = aggregator();
        let sink = RecordingSink::new();
        let meta = metadata();
        let whale = addr(0xa1);

        let mut outcome = AlertOutcome::NoBreach;
        for i in 0..3 {
            let ts = T0 + i * 10;
            add_tx(&mut agg, &[transfer(ts, whale, contract(), token(), 400)]);
            let flows = agg.compute(&contract(), ts);
            outcome = agg.maybe_alert(&contract(), &flows, ts, &sink, &meta).await;
            if i < 2 {
                assert_eq!(outcome, AlertOutcome::NoBreach);
            }
        }

        let flows = agg.compute(&contract(), T0 + 20);
        assert_eq!(flows[0].sender_sum(&whale, &token()), Some(Decimal::from(1200)));
        assert!(flows[0]
            .breaches
            .iter()
            .any(|b| b.role == FlowRole::Sender && b.address == whale));
        assert!(matches!(outcome, AlertOutcome::Dispatched { .. }));
        assert_eq!(sink.sent().len(), 1);

        add_tx(&mut agg, &[transfer(T0 + 30, whale, contract(), token(), 400)]);
        let flows = agg.compute(&contract(), T0 + 30);
        let outcome = agg.maybe_alert(&contract(), &flows, T0 + 30, &sink, &meta).await;
        assert!(matches!(outcome, AlertOutcome::CoolingDown { .. }));
        assert_eq!(sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_window() {
        let mut agg = aggregator();
        let sink = RecordingSink::new();
        let meta = metadata();
        add_tx(&mut agg, &[transfer(T0, addr(1), addr(2), token(), 5000)]);
        let flows = agg.compute(&contract(), T0);

        assert!(matches!(
            agg.maybe_alert(&contract(), &flows, T0, &sink, &meta).await,
            AlertOutcome::Dispatched { .. }
        ));
        assert_eq!(
            agg.maybe_alert(&contract(), &flows, T0 + COOLDOWN / 2, &sink, &meta).await,
            AlertOutcome::CoolingDown { remaining_secs: COOLDOWN / 2 }
        );
        assert!(matches!(
            agg.maybe_alert(&contract(), &flows, T0 + COOLDOWN + 1, &sink, &meta).await,
            AlertOutcome::Dispatched { .. }
        ));
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_dispatch_does_not_start_cooldown() {
        let mut agg = aggregator();
        let sink = RecordingSink::failing();
        let meta = metadata();
        add_tx(&mut agg, &[transfer(T0, addr(1), addr(2), token(), 5000)]);
        let flows = agg.compute(&contract(), T0);

        assert_eq!(agg.maybe_alert(&contract(), &flows, T0, &sink, &meta).await, AlertOutcome::Failed);
        assert_eq!(agg.cooldown_remaining(&contract(), T0), None);

        sink.set_failing(false);
        assert!(matches!(
            agg.maybe_alert(&contract(), &flows, T0, &sink, &meta).await,
            AlertOutcome::Dispatched { .. }
        ));
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_alert_message_format_and_cap() {
        let mut agg = aggregator();
        let sink = RecordingSink::new();
        let meta = metadata();
        // 10 senders into one receiver: 10 sender breaches + 1 receiver breach, in both windows.
        let events: Vec<_> = (1..=10)
            .map(|n| transfer(T0, addr(n), addr(0xbb), token(), 1500))
            .collect();
        add_tx(&mut agg, &events);
        let flows = agg.compute(&contract(), T0);

        let outcome = agg.maybe_alert(&contract(), &flows, T0, &sink, &meta).await;
        assert_eq!(outcome, AlertOutcome::Dispatched { breaches: 22 });

        let sent = sink.sent();
        let lines: Vec<&str> = sent[0].lines().collect();
        assert_eq!(lines[0], format!("🐋 Hot Wallet Alert - Contract {}", contract()));
        assert_eq!(lines.len(), 1 + MAX_ALERT_LINES);
        assert_eq!(
            lines[1],
            format!(
                "- 60s: sender={} token=UNKNOWN({}) window_sum=1,500.0000 thr=1,000.0000",
                addr(1).short(),
                token().short()
            )
        );
        assert!(lines[11].starts_with("- 60s: receiver="));
        assert!(lines[12].starts_with("- 300s: sender="));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(1200)), "1,200.0000");
        assert_eq!(format_amount(Decimal::new(123_456_789, 5)), "1,234.5679");
        assert_eq!(format_amount(Decimal::new(5, 1)), "0.5000");
        assert_eq!(format_amount(Decimal::from(-1_000_000)), "-1,000,000.0000");
    }
}
