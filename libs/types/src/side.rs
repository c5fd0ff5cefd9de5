//! Order side and book side
//!
//! The feed tags level changes and trades with the order side (`BUY` /
//! `SELL`). Resting buy interest lives on the bid side of the book, resting
//! sell interest on the ask side.

use serde::{Deserialize, Serialize};

/// Order side as reported by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy interest (bid)
    BUY,
    /// Sell interest (ask)
    SELL,
}

impl Side {
    /// Parse a feed side tag, case-insensitively.
    ///
    /// Accepts `buy`/`bid` and `sell`/`ask`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "bid" => Some(Side::BUY),
            "sell" | "ask" => Some(Side::SELL),
            _ => None,
        }
    }

    /// The book side that resting interest of this side lives on.
    pub fn book_side(&self) -> BookSide {
        match self {
            Side::BUY => BookSide::Bid,
            Side::SELL => BookSide::Ask,
        }
    }
}

/// One side of an order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Sorted by price descending (best bid first)
    Bid,
    /// Sorted by price ascending (best ask first)
    Ask,
}
