//! Market engine error types.

use driftfx_common::Symbol;
use thiserror::Error;

/// Errors that can occur in the market engine.
///
/// Validation errors are detected before any mutation and never leave
/// partial state behind. `PersistenceFailure` and `Timeout` roll back the
/// in-memory change for the operation that hit them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    /// Unknown currency symbol.
    #[error("Unknown currency: {0}")]
    NotFound(Symbol),

    /// Currency already exists.
    #[error("Currency already exists: {0}")]
    AlreadyExists(Symbol),

    /// Operation is illegal on the base currency.
    #[error("{0} is the base currency")]
    IsBaseCurrency(Symbol),

    /// Out-of-range rate, volatility, or amount.
    #[error("Invalid {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// Storage read or write failed.
    #[error("Storage error: {0}")]
    PersistenceFailure(String),

    /// Persistence call exceeded its deadline.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl MarketError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::PersistenceFailure(_) | MarketError::Timeout(_)
        )
    }

    /// Get a stable error code for upstream layers.
    pub fn error_code(&self) -> &'static str {
        match self {
            MarketError::NotFound(_) => "NOT_FOUND",
            MarketError::AlreadyExists(_) => "ALREADY_EXISTS",
            MarketError::IsBaseCurrency(_) => "IS_BASE_CURRENCY",
            MarketError::InvalidValue { .. } => "INVALID_VALUE",
            MarketError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
            MarketError::Timeout(_) => "TIMEOUT",
        }
    }
}

/// Result type alias for market operations.
pub type MarketResult<T> = std::result::Result<T, MarketError>;
