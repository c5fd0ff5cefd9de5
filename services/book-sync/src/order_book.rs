//! Processed order book record
//!
//! One immutable `ProcessedOrderBook` per instrument. The registry owns the
//! current record behind an `Arc`; every snapshot or delta produces a new
//! record instead of mutating the old one, so a reader holding an `Arc`
//! keeps a consistent view for as long as it likes.
//!
//! Derived fields (best prices, spread, midpoint, aggregate sizes) are
//! computed once in `assemble` and never recomputed on read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::{InstrumentId, MarketId};
use types::numeric::Price;

use crate::levels::{LevelSet, PriceLevel};
use crate::snapshot::compute_checksum;

/// Where the current state of a book came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSource {
    /// Full replacement (feed `book` event or snapshot source response).
    Snapshot,
    /// Snapshot with one or more deltas applied on top.
    Incremental,
}

/// Best bid and best ask of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPrices {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

/// Fully computed order book for a single instrument.
///
/// Bids are stored in descending price order (best bid first).
/// Asks are stored in ascending price order (best ask first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOrderBook {
    pub instrument_id: InstrumentId,
    pub market_id: MarketId,
    bids: LevelSet,
    asks: LevelSet,
    /// Best bid; provider-reported after a delta, head of `bids` otherwise.
    pub best_bid: Option<Price>,
    /// Best ask; provider-reported after a delta, head of `asks` otherwise.
    pub best_ask: Option<Price>,
    /// `best_ask - best_bid`, only when both sides are present.
    pub spread: Option<Decimal>,
    /// `(best_bid + best_ask) / 2`, only when both sides are present.
    pub midpoint: Option<Decimal>,
    pub total_bid_size: Decimal,
    pub total_ask_size: Decimal,
    pub source: BookSource,
    /// Version token: provider hash when supplied, else a SHA-256 checksum.
    pub hash: String,
    /// Provider timestamp (Unix millis).
    pub timestamp: i64,
    /// Local wall-clock time this record was produced (Unix millis).
    pub received_at: i64,
}

/// Inputs for building a record; derived fields are filled by `assemble`.
#[derive(Debug, Clone)]
pub(crate) struct BookParts {
    pub instrument_id: InstrumentId,
    pub market_id: MarketId,
    pub bids: LevelSet,
    pub asks: LevelSet,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub source: BookSource,
    pub hash: Option<String>,
    pub timestamp: i64,
    pub received_at: i64,
}

impl ProcessedOrderBook {
    pub(crate) fn assemble(parts: BookParts) -> Self {
        let (spread, midpoint) = match (parts.best_bid, parts.best_ask) {
            (Some(bid), Some(ask)) => {
                let bid = bid.as_decimal();
                let ask = ask.as_decimal();
                (Some(ask - bid), Some((bid + ask) / Decimal::TWO))
            }
            _ => (None, None),
        };

        let hash = match parts.hash {
            Some(hash) if !hash.is_empty() => hash,
            _ => compute_checksum(parts.bids.levels(), parts.asks.levels()),
        };

        Self {
            total_bid_size: parts.bids.total_size(),
            total_ask_size: parts.asks.total_size(),
            instrument_id: parts.instrument_id,
            market_id: parts.market_id,
            bids: parts.bids,
            asks: parts.asks,
            best_bid: parts.best_bid,
            best_ask: parts.best_ask,
            spread,
            midpoint,
            source: parts.source,
            hash,
            timestamp: parts.timestamp,
            received_at: parts.received_at,
        }
    }

    /// Bid levels, best first.
    pub fn bids(&self) -> &[PriceLevel] {
        self.bids.levels()
    }

    /// Ask levels, best first.
    pub fn asks(&self) -> &[PriceLevel] {
        self.asks.levels()
    }

    pub(crate) fn bid_set(&self) -> &LevelSet {
        &self.bids
    }

    pub(crate) fn ask_set(&self) -> &LevelSet {
        &self.asks
    }

    pub fn best_prices(&self) -> BestPrices {
        BestPrices {
            best_bid: self.best_bid,
            best_ask: self.best_ask,
        }
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Whether both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Best bid at or above best ask.
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid, self.best_ask), (Some(bid), Some(ask)) if bid >= ask)
    }

    /// Milliseconds since this record was produced.
    pub fn age_ms(&self, now: i64) -> i64 {
        now.saturating_sub(self.received_at)
    }

    /// Whether the record is older than `threshold_ms`.
    pub fn is_stale(&self, now: i64, threshold_ms: i64) -> bool {
        self.age_ms(now) > threshold_ms
    }

    /// Check ordering and size invariants on both sides.
    pub fn is_well_formed(&self) -> bool {
        self.bids.is_well_formed() && self.asks.is_well_formed()
    }
}
