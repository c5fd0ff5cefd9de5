//! Inbound feed events
//!
//! The delta stream sends JSON frames holding one event object or an array
//! of them. Events are a closed union discriminated by `event_type`; any
//! other tag fails decoding and the frame is rejected as a whole.
//!
//! All numeric fields are carried as strings here and parsed downstream,
//! where malformed values can be read as zero instead of failing the frame.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::time::parse_timestamp_ms;

use crate::snapshot::RawLevel;

/// Full-book replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMessage {
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, alias = "buys")]
    pub bids: Vec<RawLevel>,
    #[serde(default, alias = "sells")]
    pub asks: Vec<RawLevel>,
}

/// One level change within a `price_change` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChangeEntry {
    /// Falls back to the enclosing message's `asset_id` when absent.
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub size: String,
    pub side: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub best_bid: Option<String>,
    #[serde(default)]
    pub best_ask: Option<String>,
}

/// Batch of incremental level changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChangeMessage {
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default, alias = "changes")]
    pub price_changes: Vec<PriceChangeEntry>,
}

/// Last traded price notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTradeMessage {
    pub asset_id: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub price: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub size: String,
    #[serde(default)]
    pub side: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: String,
}

/// Event received from the delta stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FeedEvent {
    Book(BookMessage),
    PriceChange(PriceChangeMessage),
    LastTradePrice(LastTradeMessage),
}

impl FeedEvent {
    /// Wire tag of this event.
    pub fn event_type_label(&self) -> &'static str {
        match self {
            FeedEvent::Book(_) => "book",
            FeedEvent::PriceChange(_) => "price_change",
            FeedEvent::LastTradePrice(_) => "last_trade_price",
        }
    }

    /// Instruments this event touches, in first-seen order, without repeats.
    pub fn instrument_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        match self {
            FeedEvent::Book(msg) => push_unique(&mut ids, &msg.asset_id),
            FeedEvent::LastTradePrice(msg) => push_unique(&mut ids, &msg.asset_id),
            FeedEvent::PriceChange(msg) => {
                for entry in &msg.price_changes {
                    if let Some(id) = entry.asset_id.as_deref().or(msg.asset_id.as_deref()) {
                        push_unique(&mut ids, id);
                    }
                }
            }
        }
        ids
    }

    /// Provider timestamp in Unix millis, if present and numeric.
    pub fn timestamp_ms(&self) -> Option<i64> {
        let raw = match self {
            FeedEvent::Book(msg) => &msg.timestamp,
            FeedEvent::PriceChange(msg) => &msg.timestamp,
            FeedEvent::LastTradePrice(msg) => &msg.timestamp,
        };
        parse_timestamp_ms(raw)
    }
}

fn push_unique<'a>(ids: &mut Vec<&'a str>, id: &'a str) {
    if !id.trim().is_empty() && !ids.contains(&id) {
        ids.push(id);
    }
}

/// Decode one frame of the delta stream.
///
/// A frame is either a single event object or an array of them. One bad
/// element fails the whole frame.
pub fn decode_frame(text: &str) -> Result<Vec<FeedEvent>, serde_json::Error> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Accept a JSON string, number or null as a string field.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_book_event() {
        let json = r#"{
            "event_type": "book",
            "asset_id": "token123",
            "market": "cond456",
            "timestamp": "1704067200000",
            "hash": "abc123",
            "bids": [{"price": "0.45", "size": "100"}],
            "asks": [{"price": "0.55", "size": "150"}]
        }"#;

        let events = decode_frame(json).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            FeedEvent::Book(book) => {
                assert_eq!(book.asset_id, "token123");
                assert_eq!(book.market.as_deref(), Some("cond456"));
                assert_eq!(book.bids.len(), 1);
                assert_eq!(book.asks[0].price, "0.55");
            }
            other => panic!("Expected book event, got {:?}", other),
        }
        assert_eq!(events[0].timestamp_ms(), Some(1_704_067_200_000));
        assert_eq!(events[0].event_type_label(), "book");
    }

    #[test]
    fn test_decode_price_change_array() {
        let json = r#"[{
            "event_type": "price_change",
            "market": "cond456",
            "timestamp": 1704067200000,
            "price_changes": [
                {"asset_id": "token123", "price": "0.46", "size": "50", "side": "BUY",
                 "best_bid": "0.46", "best_ask": "0.55"},
                {"asset_id": "token999", "price": 0.5, "size": 0, "side": "SELL"},
                {"asset_id": "token123", "price": "0.47", "size": "5", "side": "BUY"}
            ]
        }]"#;

        let events = decode_frame(json).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].instrument_ids(), vec!["token123", "token999"]);

        let FeedEvent::PriceChange(msg) = &events[0] else {
            panic!("Expected price change");
        };
        assert_eq!(msg.price_changes[1].price, "0.5");
        assert_eq!(msg.price_changes[1].size, "0");
        assert_eq!(msg.price_changes[0].best_bid.as_deref(), Some("0.46"));
    }

    #[test]
    fn test_price_change_falls_back_to_message_asset() {
        let json = r#"{
            "event_type": "price_change",
            "asset_id": "token123",
            "changes": [{"price": "0.46", "size": "50", "side": "buy"}]
        }"#;

        let events = decode_frame(json).unwrap();
        assert_eq!(events[0].instrument_ids(), vec!["token123"]);
        assert!(events[0].timestamp_ms().is_none());
    }

    #[test]
    fn test_decode_last_trade() {
        let json = r#"{
            "event_type": "last_trade_price",
            "asset_id": "token123",
            "market": "cond456",
            "price": "0.456",
            "size": "219.21",
            "side": "BUY",
            "timestamp": "1704067200000"
        }"#;

        let events = decode_frame(json).unwrap();
        let FeedEvent::LastTradePrice(trade) = &events[0] else {
            panic!("Expected last trade");
        };
        assert_eq!(trade.price, "0.456");
        assert_eq!(trade.side, "BUY");
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let json = r#"{"event_type": "tick_size_change", "asset_id": "token123"}"#;
        assert!(decode_frame(json).is_err());

        let mixed = r#"[
            {"event_type": "last_trade_price", "asset_id": "a", "price": "0.5"},
            {"event_type": "mystery"}
        ]"#;
        assert!(decode_frame(mixed).is_err());
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(decode_frame("{not json").is_err());
        assert!(decode_frame("[]").unwrap().is_empty());
    }

    #[test]
    fn test_serialize_round_trip_tag() {
        let event = FeedEvent::LastTradePrice(LastTradeMessage {
            asset_id: "a".to_string(),
            market: None,
            price: "0.5".to_string(),
            size: "1".to_string(),
            side: "SELL".to_string(),
            timestamp: "1".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"last_trade_price\""));
    }
}
