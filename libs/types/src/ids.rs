//! Identifier types
//!
//! Instruments and markets are named by the upstream provider (asset/token
//! ids and condition ids), so they are opaque strings. Alerts are minted
//! locally and use UUID v7 so the alert list sorts chronologically.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::IdError;

/// Identifier of one tradable instrument (an outcome token).
///
/// One order book, one price history and one velocity series are tracked
/// per instrument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    /// Create a new InstrumentId.
    ///
    /// # Panics
    /// Panics if the id is empty or whitespace only.
    pub fn new(id: impl Into<String>) -> Self {
        let s = id.into();
        assert!(!s.trim().is_empty(), "InstrumentId must not be empty");
        Self(s)
    }

    /// Try to create an InstrumentId, rejecting empty ids.
    pub fn try_new(id: impl Into<String>) -> Result<Self, IdError> {
        let s = id.into();
        if s.trim().is_empty() {
            return Err(IdError::Empty("instrument"));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Venue-side market identifier (the condition an instrument belongs to).
///
/// May be empty when the snapshot source does not report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Market id for books whose source did not report one.
    pub fn unknown() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a raised price alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Create a new AlertId with current timestamp
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
