//! Streaming theoretical option valuation over live equity trade ticks.
//!
//! Connects to a market-data provider WebSocket, subscribes to trade ticks
//! for one selected symbol, prices a fixed European call contract on every
//! tick, and maintains an append-ordered series of (underlying, option
//! price) pairs plus a latest-values snapshot for presentation layers.
//!
//! Organised around:
//! - [`pricing`]: the closed-form call valuation kernel.
//! - [`clock`]: the US-equity market clock (open/closed, local timestamps).
//! - [`series`]: the append-only [`TimeSeries`] of [`PricePoint`]s.
//! - [`finnhub`]: provider wire types.
//! - [`session`]: the epoch-guarded subscription state machine.
//! - [`feed`]: the async runner owning the provider connection.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

pub mod clock;
pub mod config;
pub mod de;
pub mod error;
pub mod feed;
pub mod finnhub;
pub mod pricing;
pub mod series;
pub mod session;

pub use config::{ContractParameters, FeedConfig};
pub use error::{DomainError, FeedError};
pub use feed::{FeedCommand, FeedHandle, SessionEvent, TickFeed};
pub use series::{PricePoint, TimeSeries};
pub use session::{
    ConnectionState, SessionSnapshot, SessionStats, StreamingSession, Subscription, SymbolSwitch,
    TickOutcome,
};

/// Ticker symbol identifying one instrument at the market-data provider.
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    /// Construct a new [`Symbol`].
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<S> From<S> for Symbol
where
    S: Into<SmolStr>,
{
    fn from(symbol: S) -> Self {
        Self(symbol.into())
    }
}
