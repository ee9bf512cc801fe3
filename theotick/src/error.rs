use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated by the tick feed.
///
/// None of these are fatal to a running feed: connection failures park the
/// subscription at idle, protocol failures discard the offending message,
/// and domain failures skip the offending tick.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum FeedError {
    #[error("connection failure: {0}")]
    Connection(String),

    #[error("provider protocol violation: {0}")]
    Protocol(String),

    #[error("pricing rejected tick: {0}")]
    Domain(#[from] DomainError),
}

/// Pricing kernel failures caused by mathematically invalid inputs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Error)]
pub enum DomainError {
    #[error("volatility must be positive, got {0}")]
    NonPositiveVolatility(f64),

    #[error("time to expiration must be positive, got {0}")]
    NonPositiveExpiry(f64),
}

impl FeedError {
    /// Determine if an error means the provider connection was released and
    /// a symbol reselect is required to resume streaming.
    pub fn is_connection(&self) -> bool {
        matches!(self, FeedError::Connection(_))
    }
}
