//! Incremental reconciliation
//!
//! Applies one price-level change to an existing book and produces a new
//! record. The old record is never touched.
//!
//! Best bid/ask are taken from the provider fields carried on the change
//! when present: they may reflect depth that has not been materialized
//! locally. Only when the provider omits them do we fall back to the heads
//! of the local level sets.

use thiserror::Error;
use types::ids::InstrumentId;
use types::numeric::{Price, Size};
use types::side::Side;

use crate::events::PriceChangeEntry;
use crate::levels::LevelChange;
use crate::order_book::{BookParts, BookSource, ProcessedOrderBook};

/// Errors that make a wire change unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeltaError {
    #[error("Price change carries no instrument id")]
    MissingInstrument,

    #[error("Unrecognized side: {0}")]
    InvalidSide(String),
}

/// A single level change, parsed from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub instrument_id: InstrumentId,
    pub price: Price,
    /// New absolute size at `price`; zero removes the level.
    pub size: Size,
    pub side: Side,
    /// Provider best bid after this change.
    pub best_bid: Option<Price>,
    /// Provider best ask after this change.
    pub best_ask: Option<Price>,
    pub hash: Option<String>,
    /// Provider timestamp (Unix millis), zero when absent.
    pub timestamp: i64,
}

/// A parsed change plus the number of numeric fields read as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChange {
    pub change: PriceChange,
    pub malformed_fields: usize,
}

impl PriceChange {
    /// Parse a wire entry.
    ///
    /// The instrument id falls back to the enclosing message's id. Malformed
    /// price or size are read as zero; malformed best prices are dropped.
    /// Only a missing instrument or an unknown side reject the entry.
    pub fn from_entry(
        entry: &PriceChangeEntry,
        fallback_instrument: Option<&str>,
        timestamp: i64,
    ) -> Result<ParsedChange, DeltaError> {
        let raw_id = entry
            .asset_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or(fallback_instrument)
            .ok_or(DeltaError::MissingInstrument)?;
        let instrument_id =
            InstrumentId::try_new(raw_id).map_err(|_| DeltaError::MissingInstrument)?;

        let side = Side::parse(&entry.side).ok_or_else(|| DeltaError::InvalidSide(entry.side.clone()))?;

        let mut malformed_fields = 0;
        let price = Price::parse(&entry.price).unwrap_or_else(|_| {
            malformed_fields += 1;
            Price::ZERO
        });
        let size = Size::parse(&entry.size).unwrap_or_else(|_| {
            malformed_fields += 1;
            Size::ZERO
        });

        let mut optional_price = |raw: &Option<String>| -> Option<Price> {
            let raw = raw.as_deref()?.trim();
            if raw.is_empty() {
                return None;
            }
            match Price::parse(raw) {
                Ok(price) => Some(price),
                Err(_) => {
                    malformed_fields += 1;
                    None
                }
            }
        };
        let best_bid = optional_price(&entry.best_bid);
        let best_ask = optional_price(&entry.best_ask);

        Ok(ParsedChange {
            change: PriceChange {
                instrument_id,
                price,
                size,
                side,
                best_bid,
                best_ask,
                hash: entry.hash.clone().filter(|h| !h.is_empty()),
                timestamp,
            },
            malformed_fields,
        })
    }
}

/// Result of reconciling one change.
#[derive(Debug, Clone)]
pub struct AppliedDelta {
    pub book: ProcessedOrderBook,
    pub level_change: LevelChange,
}

/// Apply a single change to a book, producing a new record.
///
/// Provenance becomes `Incremental` and `received_at` becomes `now`.
pub fn apply_price_change(book: &ProcessedOrderBook, change: &PriceChange, now: i64) -> AppliedDelta {
    let mut bids = book.bid_set().clone();
    let mut asks = book.ask_set().clone();

    let level_change = match change.side {
        Side::BUY => bids.apply(change.price, change.size),
        Side::SELL => asks.apply(change.price, change.size),
    };

    let best_bid = change
        .best_bid
        .filter(Price::is_positive)
        .or_else(|| bids.best_price());
    let best_ask = change
        .best_ask
        .filter(Price::is_positive)
        .or_else(|| asks.best_price());

    let timestamp = if change.timestamp > 0 {
        change.timestamp
    } else {
        book.timestamp
    };

    let book = ProcessedOrderBook::assemble(BookParts {
        instrument_id: book.instrument_id.clone(),
        market_id: book.market_id.clone(),
        bids,
        asks,
        best_bid,
        best_ask,
        source: BookSource::Incremental,
        hash: change.hash.clone(),
        timestamp,
        received_at: now,
    });

    AppliedDelta { book, level_change }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::PriceLevel;
    use crate::snapshot::{process_snapshot, SnapshotInput};
    use rust_decimal::Decimal;
    use types::ids::MarketId;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn p(s: &str) -> Price {
        Price::parse(s).unwrap()
    }

    fn level(price: &str, size: &str) -> PriceLevel {
        PriceLevel::new(p(price), Size::parse(size).unwrap())
    }

    fn make_book() -> ProcessedOrderBook {
        process_snapshot(SnapshotInput {
            instrument_id: InstrumentId::new("token-yes"),
            market_id: MarketId::new("0xcond"),
            bids: vec![level("0.45", "100"), level("0.44", "50")],
            asks: vec![level("0.55", "150"), level("0.56", "10")],
            timestamp: 1_000,
            hash: None,
            source: BookSource::Snapshot,
            received_at: 1_000,
        })
    }

    fn change(side: Side, price: &str, size: &str) -> PriceChange {
        PriceChange {
            instrument_id: InstrumentId::new("token-yes"),
            price: p(price),
            size: Size::parse(size).unwrap(),
            side,
            best_bid: None,
            best_ask: None,
            hash: None,
            timestamp: 2_000,
        }
    }

    fn entry(price: &str, size: &str, side: &str) -> PriceChangeEntry {
        PriceChangeEntry {
            asset_id: Some("token-yes".to_string()),
            price: price.to_string(),
            size: size.to_string(),
            side: side.to_string(),
            hash: None,
            best_bid: None,
            best_ask: None,
        }
    }

    #[test]
    fn test_insert_new_bid_level() {
        let book = make_book();
        let applied = apply_price_change(&book, &change(Side::BUY, "0.46", "20"), 5_000);

        assert_eq!(applied.level_change, LevelChange::Inserted(0));
        assert_eq!(applied.book.best_bid, Some(p("0.46")));
        assert_eq!(applied.book.bid_depth(), 3);
        assert_eq!(applied.book.total_bid_size, d("170"));
        assert_eq!(applied.book.source, BookSource::Incremental);
        assert_eq!(applied.book.received_at, 5_000);
        assert_eq!(applied.book.timestamp, 2_000);
        assert!(applied.book.is_well_formed());

        // Original record untouched
        assert_eq!(book.bid_depth(), 2);
        assert_eq!(book.source, BookSource::Snapshot);
    }

    #[test]
    fn test_update_existing_level() {
        let applied = apply_price_change(&make_book(), &change(Side::SELL, "0.56", "40"), 5_000);
        assert_eq!(applied.level_change, LevelChange::Updated(1));
        assert_eq!(applied.book.total_ask_size, d("190"));
        assert_eq!(applied.book.ask_depth(), 2);
    }

    #[test]
    fn test_zero_size_removes_level() {
        let applied = apply_price_change(&make_book(), &change(Side::SELL, "0.55", "0"), 5_000);
        assert_eq!(applied.level_change, LevelChange::Removed(0));
        assert_eq!(applied.book.best_ask, Some(p("0.56")));
        assert_eq!(applied.book.spread, Some(d("0.11")));
    }

    #[test]
    fn test_zero_size_for_absent_level_leaves_levels_unchanged() {
        let book = make_book();
        let applied = apply_price_change(&book, &change(Side::BUY, "0.30", "0"), 5_000);
        assert_eq!(applied.level_change, LevelChange::Unchanged);
        assert_eq!(applied.book.bids(), book.bids());
        assert_eq!(applied.book.asks(), book.asks());
        assert_eq!(applied.book.best_bid, book.best_bid);
        assert_eq!(applied.book.midpoint, book.midpoint);
    }

    #[test]
    fn test_provider_best_prices_are_authoritative() {
        let mut c = change(Side::BUY, "0.44", "60");
        c.best_bid = Some(p("0.47"));
        c.best_ask = Some(p("0.53"));

        let applied = apply_price_change(&make_book(), &c, 5_000);
        assert_eq!(applied.book.best_bid, Some(p("0.47")));
        assert_eq!(applied.book.best_ask, Some(p("0.53")));
        assert_eq!(applied.book.spread, Some(d("0.06")));
        assert_eq!(applied.book.midpoint, Some(d("0.50")));
    }

    #[test]
    fn test_zero_provider_best_price_falls_back_to_levels() {
        let mut c = change(Side::BUY, "0.44", "60");
        c.best_bid = Some(Price::ZERO);

        let applied = apply_price_change(&make_book(), &c, 5_000);
        assert_eq!(applied.book.best_bid, Some(p("0.45")));
    }

    #[test]
    fn test_provider_hash_carried() {
        let mut c = change(Side::BUY, "0.44", "60");
        c.hash = Some("h-2".to_string());
        assert_eq!(apply_price_change(&make_book(), &c, 5_000).book.hash, "h-2");

        let recomputed = apply_price_change(&make_book(), &change(Side::BUY, "0.44", "60"), 5_000);
        assert_eq!(recomputed.book.hash.len(), 64);
        assert_ne!(recomputed.book.hash, make_book().hash);
    }

    #[test]
    fn test_from_entry_parses_fields() {
        let mut e = entry("0.46", "20", "buy");
        e.best_bid = Some("0.46".to_string());
        e.best_ask = Some("".to_string());

        let parsed = PriceChange::from_entry(&e, None, 1_000).unwrap();
        assert_eq!(parsed.malformed_fields, 0);
        assert_eq!(parsed.change.side, Side::BUY);
        assert_eq!(parsed.change.best_bid, Some(p("0.46")));
        assert!(parsed.change.best_ask.is_none());
        assert_eq!(parsed.change.timestamp, 1_000);
    }

    #[test]
    fn test_from_entry_malformed_numbers_read_as_zero() {
        let mut e = entry("x", "20", "SELL");
        e.best_ask = Some("bad".to_string());

        let parsed = PriceChange::from_entry(&e, None, 0).unwrap();
        assert_eq!(parsed.malformed_fields, 2);
        assert!(parsed.change.price.is_zero());
        assert!(parsed.change.best_ask.is_none());
    }

    #[test]
    fn test_from_entry_instrument_fallback() {
        let mut e = entry("0.46", "20", "BUY");
        e.asset_id = None;

        let parsed = PriceChange::from_entry(&e, Some("token-no"), 0).unwrap();
        assert_eq!(parsed.change.instrument_id.as_str(), "token-no");

        assert_eq!(
            PriceChange::from_entry(&e, None, 0),
            Err(DeltaError::MissingInstrument)
        );
    }

    #[test]
    fn test_from_entry_rejects_unknown_side() {
        let e = entry("0.46", "20", "HOLD");
        assert_eq!(
            PriceChange::from_entry(&e, None, 0),
            Err(DeltaError::InvalidSide("HOLD".to_string()))
        );
    }
}
