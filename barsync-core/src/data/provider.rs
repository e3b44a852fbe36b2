//! Provider gateway trait and structured error types.
//!
//! The ProviderGateway trait abstracts over market-data sources so the sync
//! engine can be driven by Yahoo Finance in production and by mocks in tests.

use super::retention::RetentionLimit;
use crate::domain::{Bar, Interval};
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for provider operations.
///
/// These are designed to be displayable in per-task failure reports.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Failures worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_) | DataError::RateLimited { .. }
        )
    }
}

/// Range selector for one fetch. The caller always supplies exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRequest {
    /// Everything from this date up to now.
    Since(NaiveDate),
    /// The most recent window of this length (or full history).
    Period(RetentionLimit),
}

/// Trait for market-data providers.
///
/// Implementations make at most one network round trip per call and own
/// their own timeouts; a timeout is reported as an ordinary `DataError`.
/// The archive store sits beside this trait: providers don't know about it.
pub trait ProviderGateway: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch bars for a provider symbol (market suffix already applied).
    ///
    /// An empty vector means the provider answered but had no rows.
    fn fetch(
        &self,
        symbol: &str,
        interval: Interval,
        request: FetchRequest,
    ) -> Result<Vec<Bar>, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(DataError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(DataError::NetworkUnreachable("timeout".into()).is_transient());
        assert!(!DataError::AuthenticationRequired("HTTP 403".into()).is_transient());
        assert!(!DataError::SymbolNotFound { symbol: "X".into() }.is_transient());
    }
}
