//! Snapshot processing
//!
//! Turns a raw, unsorted full-book snapshot (from the feed's `book` event or
//! from the snapshot source) into a `ProcessedOrderBook`.
//!
//! Numbers arrive as strings. A malformed field is read as zero and counted,
//! never raised: one bad upstream level must not poison the whole book.
//! Zero-size levels (including those whose size failed to parse) are then
//! dropped by the level set.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::{InstrumentId, MarketId};
use types::numeric::{Price, Size};
use types::side::BookSide;

use crate::events::string_or_number;
use crate::levels::{LevelSet, PriceLevel};
use crate::order_book::{BookParts, BookSource, ProcessedOrderBook};

/// A level as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLevel {
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
}

impl RawLevel {
    pub fn new(price: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            size: size.into(),
        }
    }
}

/// Response shape of the snapshot source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default)]
    pub bids: Vec<RawLevel>,
    #[serde(default)]
    pub asks: Vec<RawLevel>,
}

/// Levels parsed from the wire, with the count of fields read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLevels {
    pub levels: Vec<PriceLevel>,
    pub malformed_fields: usize,
}

/// Parse wire levels leniently.
pub fn parse_levels(raw: &[RawLevel]) -> ParsedLevels {
    let mut malformed_fields = 0;
    let levels = raw
        .iter()
        .map(|level| {
            let price = Price::parse(&level.price).unwrap_or_else(|_| {
                malformed_fields += 1;
                Price::ZERO
            });
            let size = Size::parse(&level.size).unwrap_or_else(|_| {
                malformed_fields += 1;
                Size::ZERO
            });
            PriceLevel::new(price, size)
        })
        .collect();

    ParsedLevels {
        levels,
        malformed_fields,
    }
}

/// Everything needed to build a book from a full snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotInput {
    pub instrument_id: InstrumentId,
    pub market_id: MarketId,
    /// Unsorted bid levels.
    pub bids: Vec<PriceLevel>,
    /// Unsorted ask levels.
    pub asks: Vec<PriceLevel>,
    /// Provider timestamp (Unix millis).
    pub timestamp: i64,
    /// Provider hash, if any.
    pub hash: Option<String>,
    pub source: BookSource,
    /// Local receipt time (Unix millis).
    pub received_at: i64,
}

/// Build a fully computed book from a snapshot.
///
/// Bids sorted descending, asks ascending, best prices are the heads.
/// Spread and midpoint exist only when both sides are non-empty.
pub fn process_snapshot(input: SnapshotInput) -> ProcessedOrderBook {
    let bids = LevelSet::from_levels(BookSide::Bid, input.bids);
    let asks = LevelSet::from_levels(BookSide::Ask, input.asks);

    ProcessedOrderBook::assemble(BookParts {
        instrument_id: input.instrument_id,
        market_id: input.market_id,
        best_bid: bids.best_price(),
        best_ask: asks.best_price(),
        bids,
        asks,
        source: input.source,
        hash: input.hash,
        timestamp: input.timestamp,
        received_at: input.received_at,
    })
}

/// Compute a SHA-256 checksum over the book levels.
///
/// Prices and sizes are normalized first, so `0.5` and `0.50` hash alike.
pub fn compute_checksum(bids: &[PriceLevel], asks: &[PriceLevel]) -> String {
    let mut hasher = Sha256::new();
    hash_levels(&mut hasher, bids, asks);
    format!("{:x}", hasher.finalize())
}

/// Feed both sides of a book into `hasher`, bids then asks.
pub(crate) fn hash_levels(hasher: &mut Sha256, bids: &[PriceLevel], asks: &[PriceLevel]) {
    for side in [bids, asks] {
        for level in side {
            hasher.update(level.price.as_decimal().normalize().to_string().as_bytes());
            hasher.update(b":");
            hasher.update(level.size.as_decimal().normalize().to_string().as_bytes());
            hasher.update(b"|");
        }
        hasher.update(b"---");
    }
}
