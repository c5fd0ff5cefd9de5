//! Error types shared across the workspace
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Failure to parse a decimal field received from the feed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Empty numeric field")]
    Empty,

    #[error("Invalid decimal: {0}")]
    Invalid(String),

    #[error("Negative value not allowed: {0}")]
    Negative(String),
}

/// Identifier validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Empty {0} id")]
    Empty(&'static str),
}
