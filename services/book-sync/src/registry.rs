//! Order-book registry
//!
//! Single-writer state container for every tracked instrument. All mutation
//! goes through `&mut self` methods on one owner; readers get `&self`
//! selectors or cloned `Arc`s of immutable book records and can never write
//! through them.
//!
//! Per instrument the registry holds:
//! - the current `ProcessedOrderBook`
//! - a bounded price history and the velocity derived from it
//! - the last trade
//! - a bounded queue of deltas that arrived before any snapshot
//!
//! Each instrument is reconciled independently. Nothing that goes wrong
//! for one instrument touches another's state.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use types::errors::IdError;
use types::ids::{InstrumentId, MarketId};
use types::time::parse_timestamp_ms;

use crate::delta::{apply_price_change, PriceChange};
use crate::events::{BookMessage, FeedEvent, LastTradeMessage, PriceChangeMessage};
use crate::history::{HistoryLimits, PriceHistory, PriceHistoryEntry};
use crate::levels::LevelChange;
use crate::order_book::{BestPrices, BookSource, ProcessedOrderBook};
use crate::pending::{BufferOutcome, PendingBuffer};
use crate::snapshot::{parse_levels, process_snapshot, SnapshotInput, SnapshotResponse};
use crate::trades::{LastTrade, TradeError};
use crate::velocity::{calculate, PriceVelocity, VelocityConfig};

/// Registry errors
///
/// Always scoped to the single event that caused them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid instrument: {0}")]
    InvalidInstrument(#[from] IdError),

    #[error("Rejected trade: {0}")]
    Trade(#[from] TradeError),
}

/// Runtime tuning; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// A book older than this is stale.
    pub stale_after_ms: i64,
    /// Max deltas queued per instrument awaiting a snapshot.
    pub pending_cap: usize,
    pub history_max_age_ms: i64,
    pub history_max_entries: usize,
    pub velocity: VelocityConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: 60_000,
            pending_cap: 100,
            history_max_age_ms: 120_000,
            history_max_entries: 1_000,
            velocity: VelocityConfig::default(),
        }
    }
}

impl RegistryConfig {
    pub fn history_limits(&self) -> HistoryLimits {
        HistoryLimits {
            max_age_ms: self.history_max_age_ms,
            max_entries: self.history_max_entries,
        }
    }
}

/// Running counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub snapshots_applied: u64,
    pub rest_seeds_applied: u64,
    pub rest_seeds_skipped: u64,
    pub deltas_applied: u64,
    pub deltas_buffered: u64,
    pub deltas_dropped: u64,
    pub deltas_rejected: u64,
    pub deltas_replayed: u64,
    pub trades_applied: u64,
    pub trades_rejected: u64,
    /// Numeric fields read as zero (or dropped) because they failed to parse.
    pub malformed_fields: u64,
    /// Records published with best bid at or above best ask.
    #[serde(default)]
    pub crossed_books: u64,
}

/// What happened to one delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Applied to the live book.
    Applied(LevelChange),
    /// No book yet; parked in the pending queue.
    Buffered { queued: usize },
    /// No book yet and the pending queue is full.
    Dropped { cap: usize },
}

/// Summary of a `price_change` batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub buffered: usize,
    pub dropped: usize,
    /// Entries that could not be parsed at all.
    pub rejected: usize,
}

impl BatchOutcome {
    fn record(&mut self, outcome: DeltaOutcome) {
        match outcome {
            DeltaOutcome::Applied(_) => self.applied += 1,
            DeltaOutcome::Buffered { .. } => self.buffered += 1,
            DeltaOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Result of installing a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotApplied {
    /// Pending deltas replayed on top of the snapshot.
    pub replayed: usize,
    pub malformed_fields: usize,
}

/// Result of offering a snapshot-source response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Applied(SnapshotApplied),
    /// A fresh book is already live; the response was ignored.
    SkippedFresh,
}

/// Result of routing one feed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Snapshot(SnapshotApplied),
    Deltas(BatchOutcome),
    Trade,
}

#[derive(Debug, Clone)]
pub struct OrderBookRegistry {
    config: RegistryConfig,
    books: BTreeMap<InstrumentId, Arc<ProcessedOrderBook>>,
    histories: BTreeMap<InstrumentId, PriceHistory>,
    velocities: BTreeMap<InstrumentId, PriceVelocity>,
    last_trades: BTreeMap<InstrumentId, LastTrade>,
    pending: PendingBuffer,
    stats: RegistryStats,
}

impl Default for OrderBookRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl OrderBookRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            pending: PendingBuffer::new(config.pending_cap),
            config,
            books: BTreeMap::new(),
            histories: BTreeMap::new(),
            velocities: BTreeMap::new(),
            last_trades: BTreeMap::new(),
            stats: RegistryStats::default(),
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Route one feed event.
    pub fn apply_event(&mut self, event: &FeedEvent, now: i64) -> Result<EventOutcome, RegistryError> {
        match event {
            FeedEvent::Book(msg) => self.apply_book_snapshot(msg, now).map(EventOutcome::Snapshot),
            FeedEvent::PriceChange(msg) => Ok(EventOutcome::Deltas(self.apply_price_change_message(msg, now))),
            FeedEvent::LastTradePrice(msg) => self.apply_last_trade(msg, now).map(|_| EventOutcome::Trade),
        }
    }

    /// Install a full book from the delta stream.
    ///
    /// Always replaces the current book, then replays any pending deltas.
    pub fn apply_book_snapshot(&mut self, msg: &BookMessage, now: i64) -> Result<SnapshotApplied, RegistryError> {
        let instrument_id = InstrumentId::try_new(msg.asset_id.as_str())?;
        let bids = parse_levels(&msg.bids);
        let asks = parse_levels(&msg.asks);

        let input = SnapshotInput {
            instrument_id,
            market_id: market_or_unknown(msg.market.as_deref()),
            bids: bids.levels,
            asks: asks.levels,
            timestamp: parse_timestamp_ms(&msg.timestamp).unwrap_or(now),
            hash: msg.hash.clone(),
            source: BookSource::Snapshot,
            received_at: now,
        };

        Ok(self.install_snapshot(input, bids.malformed_fields + asks.malformed_fields, now))
    }

    /// Install a book fetched from the snapshot source.
    ///
    /// Skipped when a fresh book already exists: the live stream is ahead of
    /// any polled response.
    pub fn seed_from_rest(
        &mut self,
        instrument_id: &InstrumentId,
        market_id: &MarketId,
        response: &SnapshotResponse,
        now: i64,
    ) -> SeedOutcome {
        if !self.is_stale(instrument_id, now) {
            self.stats.rest_seeds_skipped += 1;
            debug!(instrument = %instrument_id, "Fresh book present, ignoring snapshot source response");
            return SeedOutcome::SkippedFresh;
        }

        let bids = parse_levels(&response.bids);
        let asks = parse_levels(&response.asks);
        let market_id = if !market_id.is_unknown() {
            market_id.clone()
        } else {
            match (response.market.as_deref(), self.books.get(instrument_id)) {
                (Some(market), _) if !market.is_empty() => MarketId::new(market),
                (_, Some(existing)) => existing.market_id.clone(),
                _ => MarketId::unknown(),
            }
        };

        let input = SnapshotInput {
            instrument_id: instrument_id.clone(),
            market_id,
            bids: bids.levels,
            asks: asks.levels,
            timestamp: parse_timestamp_ms(&response.timestamp).unwrap_or(now),
            hash: response.hash.clone(),
            source: BookSource::Snapshot,
            received_at: now,
        };

        self.stats.rest_seeds_applied += 1;
        SeedOutcome::Applied(self.install_snapshot(input, bids.malformed_fields + asks.malformed_fields, now))
    }

    /// Apply one delta, or park it if the instrument has no book yet.
    pub fn apply_incremental_delta(&mut self, change: PriceChange, now: i64) -> DeltaOutcome {
        let Some(book) = self.books.get(&change.instrument_id) else {
            return match self.pending.push(change, now) {
                BufferOutcome::Buffered { queued } => {
                    self.stats.deltas_buffered += 1;
                    DeltaOutcome::Buffered { queued }
                }
                BufferOutcome::Dropped { cap } => {
                    self.stats.deltas_dropped += 1;
                    DeltaOutcome::Dropped { cap }
                }
            };
        };

        let applied = apply_price_change(book, &change, now);
        self.stats.deltas_applied += 1;
        debug!(
            instrument = %change.instrument_id,
            price = %change.price,
            size = %change.size,
            side = ?change.side,
            "Applied delta"
        );
        self.commit(applied.book, now);
        DeltaOutcome::Applied(applied.level_change)
    }

    /// Apply every entry of a `price_change` event.
    ///
    /// Entries that cannot be parsed are counted and skipped; the rest of
    /// the batch still applies.
    pub fn apply_price_change_message(&mut self, msg: &PriceChangeMessage, now: i64) -> BatchOutcome {
        let timestamp = parse_timestamp_ms(&msg.timestamp).unwrap_or(0);
        let mut outcome = BatchOutcome::default();

        for entry in &msg.price_changes {
            match PriceChange::from_entry(entry, msg.asset_id.as_deref(), timestamp) {
                Ok(parsed) => {
                    self.note_malformed(parsed.malformed_fields);
                    outcome.record(self.apply_incremental_delta(parsed.change, now));
                }
                Err(err) => {
                    self.stats.deltas_rejected += 1;
                    outcome.rejected += 1;
                    warn!(error = %err, price = %entry.price, "Rejected price change");
                }
            }
        }

        outcome
    }

    /// Replace the last trade for an instrument.
    pub fn apply_last_trade(&mut self, msg: &LastTradeMessage, now: i64) -> Result<(), RegistryError> {
        match LastTrade::from_message(msg, now) {
            Ok(trade) => {
                self.stats.trades_applied += 1;
                debug!(instrument = %trade.instrument_id, price = %trade.price, "Last trade");
                self.last_trades.insert(trade.instrument_id.clone(), trade);
                Ok(())
            }
            Err(err) => {
                self.stats.trades_rejected += 1;
                warn!(error = %err, instrument = %msg.asset_id, "Rejected trade notice");
                Err(err.into())
            }
        }
    }

    /// Release all state held for one instrument.
    pub fn clear(&mut self, instrument_id: &InstrumentId) {
        self.books.remove(instrument_id);
        self.histories.remove(instrument_id);
        self.velocities.remove(instrument_id);
        self.last_trades.remove(instrument_id);
        self.pending.clear(instrument_id);
        info!(instrument = %instrument_id, "Cleared instrument state");
    }

    pub fn clear_all(&mut self) {
        self.books.clear();
        self.histories.clear();
        self.velocities.clear();
        self.last_trades.clear();
        self.pending.clear_all();
        info!("Cleared all instrument state");
    }

    fn install_snapshot(&mut self, input: SnapshotInput, malformed_fields: usize, now: i64) -> SnapshotApplied {
        let instrument_id = input.instrument_id.clone();
        self.note_malformed(malformed_fields);
        if malformed_fields > 0 {
            warn!(instrument = %instrument_id, malformed_fields, "Snapshot had malformed levels");
        }

        let mut book = process_snapshot(input);
        let pending = self.pending.take(&instrument_id);
        let replayed = pending.len();
        for entry in pending {
            book = apply_price_change(&book, &entry.change, now).book;
        }

        self.stats.snapshots_applied += 1;
        self.stats.deltas_replayed += replayed as u64;
        info!(
            instrument = %instrument_id,
            bids = book.bid_depth(),
            asks = book.ask_depth(),
            replayed,
            "Installed snapshot"
        );

        self.commit(book, now);
        SnapshotApplied {
            replayed,
            malformed_fields,
        }
    }

    /// Publish a new record and feed history/velocity.
    fn commit(&mut self, book: ProcessedOrderBook, now: i64) {
        let instrument_id = book.instrument_id.clone();

        if let Some(midpoint) = book.midpoint {
            let limits = self.config.history_limits();
            let history = self
                .histories
                .entry(instrument_id.clone())
                .or_insert_with(|| PriceHistory::new(limits));
            history.record(PriceHistoryEntry {
                best_bid: book.best_bid,
                best_ask: book.best_ask,
                midpoint,
                timestamp: now,
            });

            if let Some(velocity) = calculate(history, now, &self.config.velocity) {
                if velocity.is_anomaly {
                    debug!(
                        instrument = %instrument_id,
                        change_1s = %velocity.change_1s,
                        change_5s = %velocity.change_5s,
                        "Velocity anomaly"
                    );
                }
                self.velocities.insert(instrument_id.clone(), velocity);
            }
        } else {
            // No midpoint: the old velocity no longer applies
            self.velocities.remove(&instrument_id);
        }

        if book.is_crossed() {
            self.stats.crossed_books += 1;
            warn!(
                instrument = %instrument_id,
                best_bid = ?book.best_bid,
                best_ask = ?book.best_ask,
                "Crossed book"
            );
        }

        self.books.insert(instrument_id, Arc::new(book));
    }

    fn note_malformed(&mut self, count: usize) {
        self.stats.malformed_fields += count as u64;
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    pub fn get_book(&self, instrument_id: &InstrumentId) -> Option<Arc<ProcessedOrderBook>> {
        self.books.get(instrument_id).cloned()
    }

    pub fn get_best_prices(&self, instrument_id: &InstrumentId) -> Option<BestPrices> {
        self.books.get(instrument_id).map(|book| book.best_prices())
    }

    pub fn get_spread(&self, instrument_id: &InstrumentId) -> Option<Decimal> {
        self.books.get(instrument_id).and_then(|book| book.spread)
    }

    pub fn get_last_trade(&self, instrument_id: &InstrumentId) -> Option<&LastTrade> {
        self.last_trades.get(instrument_id)
    }

    /// Whether the instrument's book is missing or older than the threshold.
    pub fn is_stale(&self, instrument_id: &InstrumentId, now: i64) -> bool {
        self.books
            .get(instrument_id)
            .map_or(true, |book| book.is_stale(now, self.config.stale_after_ms))
    }

    /// Instruments with a book that has gone stale.
    pub fn stale_instruments(&self, now: i64) -> Vec<InstrumentId> {
        self.books
            .iter()
            .filter(|(_, book)| book.is_stale(now, self.config.stale_after_ms))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn get_velocity(&self, instrument_id: &InstrumentId) -> Option<&PriceVelocity> {
        self.velocities.get(instrument_id)
    }

    /// Interpolated midpoint at time `t`.
    pub fn get_price_at(&self, instrument_id: &InstrumentId, t: i64) -> Option<Decimal> {
        self.histories.get(instrument_id).and_then(|history| history.price_at(t))
    }

    pub fn get_history(&self, instrument_id: &InstrumentId) -> Option<&PriceHistory> {
        self.histories.get(instrument_id)
    }

    pub fn pending_len(&self, instrument_id: &InstrumentId) -> usize {
        self.pending.len(instrument_id)
    }

    /// Instruments with a live book.
    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.books.keys()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

fn market_or_unknown(market: Option<&str>) -> MarketId {
    market
        .filter(|m| !m.is_empty())
        .map(MarketId::new)
        .unwrap_or_else(MarketId::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PriceChangeEntry;
    use crate::snapshot::RawLevel;
    use types::numeric::Price;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn id(s: &str) -> InstrumentId {
        InstrumentId::new(s)
    }

    fn book_msg(asset: &str, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> BookMessage {
        BookMessage {
            asset_id: asset.to_string(),
            market: Some("0xcond".to_string()),
            timestamp: "1704067200000".to_string(),
            hash: None,
            bids: bids.iter().map(|(p, s)| RawLevel::new(*p, *s)).collect(),
            asks: asks.iter().map(|(p, s)| RawLevel::new(*p, *s)).collect(),
        }
    }

    fn entry(asset: &str, price: &str, size: &str, side: &str) -> PriceChangeEntry {
        PriceChangeEntry {
            asset_id: Some(asset.to_string()),
            price: price.to_string(),
            size: size.to_string(),
            side: side.to_string(),
            hash: None,
            best_bid: None,
            best_ask: None,
        }
    }

    fn change_msg(entries: Vec<PriceChangeEntry>) -> PriceChangeMessage {
        PriceChangeMessage {
            asset_id: None,
            market: Some("0xcond".to_string()),
            timestamp: "1704067200000".to_string(),
            price_changes: entries,
        }
    }

    fn trade_msg(asset: &str, price: &str) -> LastTradeMessage {
        LastTradeMessage {
            asset_id: asset.to_string(),
            market: None,
            price: price.to_string(),
            size: "10".to_string(),
            side: "BUY".to_string(),
            timestamp: String::new(),
        }
    }

    fn seeded() -> OrderBookRegistry {
        let mut registry = OrderBookRegistry::default();
        registry
            .apply_book_snapshot(&book_msg("a", &[("0.45", "100")], &[("0.55", "100")]), 1_000)
            .unwrap();
        registry
    }

    #[test]
    fn test_snapshot_installs_book_and_history() {
        let registry = seeded();
        let book = registry.get_book(&id("a")).unwrap();

        assert_eq!(book.midpoint, Some(d("0.50")));
        assert_eq!(registry.get_spread(&id("a")), Some(d("0.10")));
        assert_eq!(registry.get_history(&id("a")).unwrap().len(), 1);
        assert_eq!(registry.get_velocity(&id("a")).unwrap().change_5s, Decimal::ZERO);
        assert_eq!(registry.stats().snapshots_applied, 1);
    }

    #[test]
    fn test_one_sided_snapshot_skips_history() {
        let mut registry = OrderBookRegistry::default();
        registry
            .apply_book_snapshot(&book_msg("a", &[("0.45", "100")], &[]), 1_000)
            .unwrap();

        assert!(registry.get_book(&id("a")).is_some());
        assert!(registry.get_history(&id("a")).is_none());
        assert!(registry.get_velocity(&id("a")).is_none());
    }

    #[test]
    fn test_one_sided_update_drops_velocity() {
        let mut registry = seeded();
        assert!(registry.get_velocity(&id("a")).is_some());

        registry.apply_price_change_message(&change_msg(vec![entry("a", "0.55", "0", "SELL")]), 2_000);

        assert!(registry.get_book(&id("a")).unwrap().midpoint.is_none());
        assert!(registry.get_velocity(&id("a")).is_none());
        assert_eq!(registry.get_history(&id("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_crossed_book_counted() {
        let mut registry = OrderBookRegistry::default();
        registry
            .apply_book_snapshot(&book_msg("a", &[("0.60", "1")], &[("0.55", "1")]), 1_000)
            .unwrap();

        assert!(registry.get_book(&id("a")).unwrap().is_crossed());
        assert_eq!(registry.stats().crossed_books, 1);
        assert_eq!(seeded().stats().crossed_books, 0);
    }

    #[test]
    fn test_delta_before_snapshot_is_buffered_then_replayed() {
        let mut registry = OrderBookRegistry::default();
        let outcome = registry.apply_price_change_message(&change_msg(vec![entry("a", "0.46", "20", "BUY")]), 500);
        assert_eq!(outcome.buffered, 1);
        assert!(registry.get_book(&id("a")).is_none());
        assert_eq!(registry.pending_len(&id("a")), 1);

        let applied = registry
            .apply_book_snapshot(&book_msg("a", &[("0.45", "100")], &[("0.55", "100")]), 1_000)
            .unwrap();
        assert_eq!(applied.replayed, 1);
        assert_eq!(registry.pending_len(&id("a")), 0);

        let book = registry.get_book(&id("a")).unwrap();
        assert_eq!(book.best_bid, Some(Price::parse("0.46").unwrap()));
        assert_eq!(book.source, BookSource::Incremental);
        assert_eq!(book.received_at, 1_000);
        // History records the final state only
        assert_eq!(registry.get_history(&id("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_each_update_is_a_new_record() {
        let mut registry = seeded();
        let before = registry.get_book(&id("a")).unwrap();

        registry.apply_price_change_message(&change_msg(vec![entry("a", "0.45", "0", "BUY")]), 2_000);
        let after = registry.get_book(&id("a")).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.bid_depth(), 1);
        assert_eq!(after.bid_depth(), 0);
        assert!(after.midpoint.is_none());
    }

    #[test]
    fn test_rejected_entries_do_not_block_batch() {
        let mut registry = seeded();
        let outcome = registry.apply_price_change_message(
            &change_msg(vec![entry("a", "0.46", "5", "HOLD"), entry("a", "0.46", "5", "BUY")]),
            2_000,
        );
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.applied, 1);
        assert_eq!(registry.stats().deltas_rejected, 1);
    }

    #[test]
    fn test_malformed_fields_counted() {
        let mut registry = OrderBookRegistry::default();
        registry
            .apply_book_snapshot(&book_msg("a", &[("0.45", "??")], &[("0.55", "1")]), 1_000)
            .unwrap();
        assert_eq!(registry.stats().malformed_fields, 1);
        assert!(registry.get_best_prices(&id("a")).unwrap().best_bid.is_none());
    }

    #[test]
    fn test_staleness() {
        let registry = seeded();
        assert!(!registry.is_stale(&id("a"), 1_000 + 59_000));
        assert!(registry.is_stale(&id("a"), 1_000 + 61_000));
        assert!(registry.is_stale(&id("unknown"), 1_000));
        assert_eq!(registry.stale_instruments(1_000 + 61_000), vec![id("a")]);
    }

    #[test]
    fn test_seed_from_rest_respects_fresh_book() {
        let mut registry = seeded();
        let response = SnapshotResponse {
            market: None,
            hash: None,
            timestamp: String::new(),
            bids: vec![RawLevel::new("0.30", "1")],
            asks: vec![RawLevel::new("0.70", "1")],
        };

        let outcome = registry.seed_from_rest(&id("a"), &MarketId::unknown(), &response, 2_000);
        assert_eq!(outcome, SeedOutcome::SkippedFresh);
        assert_eq!(registry.get_book(&id("a")).unwrap().midpoint, Some(d("0.50")));

        let outcome = registry.seed_from_rest(&id("a"), &MarketId::unknown(), &response, 70_000);
        assert!(matches!(outcome, SeedOutcome::Applied(_)));
        let book = registry.get_book(&id("a")).unwrap();
        assert_eq!(book.best_bid, Some(Price::parse("0.30").unwrap()));
        assert_eq!(book.market_id.as_str(), "0xcond");
    }

    #[test]
    fn test_last_trade() {
        let mut registry = seeded();
        registry.apply_last_trade(&trade_msg("a", "0.51"), 3_000).unwrap();
        registry.apply_last_trade(&trade_msg("a", "0.52"), 4_000).unwrap();

        let trade = registry.get_last_trade(&id("a")).unwrap();
        assert_eq!(trade.price, Price::parse("0.52").unwrap());
        assert_eq!(trade.timestamp, 4_000);

        assert!(registry.apply_last_trade(&trade_msg("a", "bad"), 5_000).is_err());
        assert_eq!(registry.stats().trades_rejected, 1);
        assert_eq!(registry.get_last_trade(&id("a")).unwrap().price, Price::parse("0.52").unwrap());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut registry = seeded();
        registry.apply_last_trade(&trade_msg("a", "0.5"), 1_000).unwrap();
        registry.apply_price_change_message(&change_msg(vec![entry("b", "0.4", "1", "BUY")]), 1_000);

        registry.clear(&id("a"));
        assert!(registry.get_book(&id("a")).is_none());
        assert!(registry.get_history(&id("a")).is_none());
        assert!(registry.get_velocity(&id("a")).is_none());
        assert!(registry.get_last_trade(&id("a")).is_none());
        assert_eq!(registry.pending_len(&id("b")), 1);

        registry.clear_all();
        assert_eq!(registry.pending_len(&id("b")), 0);
        assert_eq!(registry.book_count(), 0);
    }

    #[test]
    fn test_apply_event_dispatch() {
        let mut registry = OrderBookRegistry::default();
        let outcome = registry
            .apply_event(&FeedEvent::Book(book_msg("a", &[("0.45", "1")], &[("0.55", "1")])), 1_000)
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Snapshot(_)));

        let outcome = registry
            .apply_event(&FeedEvent::LastTradePrice(trade_msg("a", "0.5")), 1_000)
            .unwrap();
        assert_eq!(outcome, EventOutcome::Trade);

        let err = registry
            .apply_event(&FeedEvent::Book(book_msg("", &[], &[])), 1_000)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInstrument(_)));
    }
}
