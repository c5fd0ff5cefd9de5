//! Types library for the order-book sync engine
//!
//! Value types shared between the reconciliation core and its consumers.
//! Prices and sizes arrive from the upstream feed as decimal strings, so
//! everything numeric is backed by `rust_decimal` and parsed exactly once.
//!
//! # Modules
//! - `ids`: Identifiers (InstrumentId, MarketId, AlertId)
//! - `numeric`: Decimal newtypes (Price, Size) with strict and lenient parsing
//! - `side`: Order side as sent on the wire, and the book side it rests on
//! - `time`: Wall-clock and provider timestamp helpers (Unix millis)
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod numeric;
pub mod side;
pub mod time;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::side::*;
    pub use crate::time::*;
}
