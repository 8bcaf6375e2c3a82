use crate::core::currency::CurrencyId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MoneyError>;

/// Errors raised by currency resolution, money arithmetic and registry operations.
///
/// Every variant is deterministic: the same inputs always produce the same
/// error, and nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("currency not found: {lookup}")]
    CurrencyNotFound { lookup: String },

    #[error("currency mismatch in {operation}: {left} vs {right}")]
    CurrencyMismatch {
        operation: &'static str,
        left: CurrencyId,
        right: CurrencyId,
    },

    #[error("invalid currency spec for '{id}': {reason}")]
    InvalidCurrencySpec { id: String, reason: String },

    #[error("rounding required to bring {value} to scale {scale}")]
    RoundingRequired { value: Decimal, scale: u32 },

    #[error("inexact division: {dividend} / {divisor} does not terminate")]
    InexactDivision { dividend: Decimal, divisor: Decimal },

    #[error("division by zero in {operation}")]
    DivisionByZero { operation: &'static str },

    #[error("arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("conversion rate must be positive, got {rate} for {from} -> {to}")]
    InvalidRate {
        from: CurrencyId,
        to: CurrencyId,
        rate: Decimal,
    },

    #[error("invalid {hierarchy} hierarchy edge {child} -> {parent}: {reason}")]
    InvalidHierarchySpec {
        hierarchy: String,
        child: String,
        parent: String,
        reason: String,
    },

    #[error("invalid allocation: {reason}")]
    InvalidAllocation { reason: String },

    #[error("merge conflict on {id}: {reason}")]
    MergeConflict { id: String, reason: String },

    #[error("invalid seed data: {0}")]
    InvalidSeed(String),
}

impl MoneyError {
    pub(crate) fn not_found(lookup: impl std::fmt::Display) -> Self {
        MoneyError::CurrencyNotFound {
            lookup: lookup.to_string(),
        }
    }

    pub(crate) fn invalid_spec(id: impl Into<String>, reason: impl Into<String>) -> Self {
        MoneyError::InvalidCurrencySpec {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MoneyError {
    fn from(err: serde_json::Error) -> Self {
        MoneyError::InvalidSeed(err.to_string())
    }
}
