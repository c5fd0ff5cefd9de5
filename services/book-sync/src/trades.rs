//! Last-trade tracking
//!
//! Only the most recent trade per instrument is kept; each notice replaces
//! the previous one wholesale.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::ids::{InstrumentId, MarketId};
use types::numeric::{Price, Size};
use types::side::Side;
use types::time::parse_timestamp_ms;

use crate::events::LastTradeMessage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Trade notice carries no instrument id")]
    MissingInstrument,

    #[error("Trade notice has unusable price: {0}")]
    InvalidPrice(String),
}

/// Most recent trade for an instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTrade {
    pub instrument_id: InstrumentId,
    pub market_id: MarketId,
    pub price: Price,
    pub size: Size,
    /// Aggressor side; `None` when the feed omits or garbles it.
    pub side: Option<Side>,
    /// Provider timestamp (Unix millis), or receipt time when absent.
    pub timestamp: i64,
}

impl LastTrade {
    /// Build from a wire notice.
    ///
    /// A trade without a positive price carries no information and is
    /// rejected. Size falls back to zero; a missing timestamp falls back to
    /// `received_at`.
    pub fn from_message(msg: &LastTradeMessage, received_at: i64) -> Result<Self, TradeError> {
        let instrument_id =
            InstrumentId::try_new(msg.asset_id.as_str()).map_err(|_| TradeError::MissingInstrument)?;

        let price = Price::parse(&msg.price)
            .ok()
            .filter(Price::is_positive)
            .ok_or_else(|| TradeError::InvalidPrice(msg.price.clone()))?;

        Ok(Self {
            instrument_id,
            market_id: msg
                .market
                .as_deref()
                .map(MarketId::new)
                .unwrap_or_else(MarketId::unknown),
            price,
            size: Size::parse_or_zero(&msg.size),
            side: Side::parse(&msg.side),
            timestamp: parse_timestamp_ms(&msg.timestamp).unwrap_or(received_at),
        })
    }
}
