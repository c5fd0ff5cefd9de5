//! Fixed-point decimal types for prices and sizes
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! The feed encodes every number as a decimal string. `parse` is strict;
//! callers that must never fail on a bad upstream field use
//! `parse_or_zero`, which maps anything unparseable to zero.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::NumericError;

/// Parse a non-negative decimal string.
///
/// Accepts plain (`"0.55"`) and scientific (`"5.5e-1"`) notation and
/// surrounding whitespace.
pub fn parse_decimal(raw: &str) -> Result<Decimal, NumericError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NumericError::Empty);
    }

    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| NumericError::Invalid(trimmed.to_string()))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(NumericError::Negative(trimmed.to_string()));
    }
    Ok(value)
}

/// Price of one level, in the quote unit (probability for binary outcomes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Strict parse from a feed string.
    pub fn parse(raw: &str) -> Result<Self, NumericError> {
        parse_decimal(raw).map(Self)
    }

    /// Lenient parse: malformed input becomes zero.
    pub fn parse_or_zero(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::ZERO)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resting size of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(Decimal);

impl Size {
    pub const ZERO: Size = Size(Decimal::ZERO);

    /// Wrap a decimal, rejecting negative values.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Strict parse from a feed string.
    pub fn parse(raw: &str) -> Result<Self, NumericError> {
        parse_decimal(raw).map(Self)
    }

    /// Lenient parse: malformed input becomes zero.
    pub fn parse_or_zero(raw: &str) -> Self {
        Self::parse(raw).unwrap_or(Self::ZERO)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_decimal() {
        let p = Price::parse("0.55").unwrap();
        assert_eq!(p.as_decimal(), Decimal::from_str_exact("0.55").unwrap());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Size::parse(" 100 ").unwrap().as_decimal(), Decimal::from(100));
    }

    #[test]
    fn test_parse_scientific() {
        let p = Price::parse("5.5e-1").unwrap();
        assert_eq!(p.as_decimal(), Decimal::from_str_exact("0.55").unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Price::parse(""), Err(NumericError::Empty));
        assert_eq!(
            Price::parse("abc"),
            Err(NumericError::Invalid("abc".to_string()))
        );
        assert_eq!(
            Size::parse("-1"),
            Err(NumericError::Negative("-1".to_string()))
        );
    }

    #[test]
    fn test_parse_or_zero() {
        assert!(Price::parse_or_zero("NaN").is_zero());
        assert!(Size::parse_or_zero("").is_zero());
        assert_eq!(Size::parse_or_zero("12.5").as_decimal(), Decimal::from_str_exact("12.5").unwrap());
    }

    #[test]
    fn test_equal_values_different_scale() {
        assert_eq!(Price::parse("0.5").unwrap(), Price::parse("0.500").unwrap());
    }

    #[test]
    fn test_serializes_as_string() {
        let p = Price::parse("0.42").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"0.42\"");
        let back: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    proptest! {
        #[test]
        fn prop_parse_or_zero_never_panics(raw in ".{0,24}") {
            let p = Price::parse_or_zero(&raw);
            prop_assert!(!p.as_decimal().is_sign_negative() || p.is_zero());
        }
    }
}
