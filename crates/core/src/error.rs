//! Ledger error model.

use thiserror::Error;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// The first four variants are caller-facing and carry human-readable detail.
/// `InvariantViolation` signals a bug inside the ledger itself and must never
/// reach a caller verbatim; the service boundary logs it and returns
/// `Internal` instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed input (same-location transfer, non-positive quantity, over-release).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced lot, record, or refrigerator does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Requested quantity exceeds available stock.
    #[error("insufficient stock: available {available}")]
    InsufficientStock { available: i64 },

    /// Lock-wait or transactional conflict; the unit of work wrote nothing,
    /// so the caller may retry.
    #[error("retryable conflict: {0}")]
    Retryable(String),

    /// A ledger invariant was violated (internal-only).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Opaque surface form of an invariant violation.
    #[error("internal ledger failure")]
    Internal,
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient_stock(available: i64) -> Self {
        Self::InsufficientStock { available }
    }

    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Whether a bounded internal retry is permitted for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_surfaces_available_amount() {
        let err = LedgerError::insufficient_stock(70);
        assert_eq!(err.to_string(), "insufficient stock: available 70");
    }

    #[test]
    fn only_retryable_is_retryable() {
        assert!(LedgerError::retryable("lock wait").is_retryable());
        assert!(!LedgerError::validation("bad input").is_retryable());
        assert!(!LedgerError::Internal.is_retryable());
    }
}
