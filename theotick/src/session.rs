//! Streaming session state machine.
//!
//! A [`StreamingSession`] tracks at most one live [`Subscription`] at a time.
//! Every subscription carries a monotonically increasing epoch, and inbound
//! ticks are only priced when they arrive with the live epoch for the live
//! symbol in the [`ConnectionState::Subscribed`] state. Ticks that fail the
//! guard are dropped as stale rather than priced against the wrong contract,
//! which keeps late arrivals from a retired subscription out of the series
//! when the user switches symbols.

use crate::{
    Symbol, clock,
    config::ContractParameters,
    error::DomainError,
    finnhub::TradeTick,
    pricing,
    series::{PricePoint, TimeSeries},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of the provider subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live subscription.
    #[default]
    Idle,
    /// Subscription requested but not yet active.
    Connecting,
    /// Subscription active and ticks are being priced.
    Subscribed,
    /// Unsubscribe sent for the previous symbol during a switch.
    Unsubscribing,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::Unsubscribing => "unsubscribing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Live subscription to one symbol, tagged with its epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub symbol: Symbol,
    pub epoch: u64,
    pub state: ConnectionState,
}

/// Provider actions required to move the session onto a new symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolSwitch {
    /// Symbol to unsubscribe first, if the previous subscription went live.
    pub unsubscribe: Option<Symbol>,
    /// Symbol to subscribe.
    pub subscribe: Symbol,
    /// Epoch assigned to the new subscription.
    pub epoch: u64,
}

/// Most recent priced tick for the live symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub symbol: Symbol,
    pub underlying_price: f64,
    pub option_price: f64,
    pub timestamp: String,
}

/// Tick accounting since the session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    /// Ticks priced and appended to the series.
    pub ticks_priced: u64,
    /// Ticks dropped by the epoch / symbol / state guard.
    pub ticks_stale: u64,
    /// Ticks rejected by the pricing model.
    pub ticks_skipped: u64,
}

/// Result of offering one tick to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Tick was priced and appended to the series.
    Priced(PricePoint),
    /// Tick failed the liveness guard and was dropped.
    Stale,
    /// Tick was live but the pricing model rejected the inputs.
    Skipped(DomainError),
}

/// Single-symbol pricing session over a live tick stream.
#[derive(Debug, Clone)]
pub struct StreamingSession {
    contract: ContractParameters,
    subscription: Option<Subscription>,
    next_epoch: u64,
    series: TimeSeries,
    latest: Option<SessionSnapshot>,
    stats: SessionStats,
}

impl StreamingSession {
    /// Construct a new [`StreamingSession`] pricing the provided contract.
    pub fn new(contract: ContractParameters) -> Self {
        Self {
            contract,
            subscription: None,
            next_epoch: 1,
            series: TimeSeries::new(),
            latest: None,
            stats: SessionStats::default(),
        }
    }

    /// Use the provided [`TimeSeries`] instead of the default unbounded one.
    pub fn with_series(self, series: TimeSeries) -> Self {
        Self { series, ..self }
    }

    /// Return the contract being priced.
    pub fn contract(&self) -> &ContractParameters {
        &self.contract
    }

    /// Return the current subscription, if any.
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Return the most recent priced tick, if any.
    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.latest.as_ref()
    }

    /// Return the accumulated price series.
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Return tick accounting for the session.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Begin switching the session to the provided symbol.
    ///
    /// Returns `None` if the symbol is already live, leaving the session
    /// untouched. Otherwise the previous subscription is retired, the series
    /// is cleared, and the returned [`SymbolSwitch`] names the provider
    /// actions to perform under the freshly assigned epoch. Epochs draw from
    /// a session-lifetime counter, so a retired epoch is never reissued.
    pub fn select_symbol(&mut self, symbol: Symbol) -> Option<SymbolSwitch> {
        if let Some(subscription) = &self.subscription {
            if subscription.symbol == symbol && subscription.state == ConnectionState::Subscribed {
                return None;
            }
        }

        let previous = self.subscription.take();
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let unsubscribe = previous
            .filter(|previous| previous.state == ConnectionState::Subscribed)
            .map(|previous| previous.symbol);

        self.series.reset();
        self.latest = None;
        self.subscription = Some(Subscription {
            symbol: symbol.clone(),
            epoch,
            state: ConnectionState::Connecting,
        });

        Some(SymbolSwitch {
            unsubscribe,
            subscribe: symbol,
            epoch,
        })
    }

    /// Mark the subscription with the provided epoch as live.
    ///
    /// Returns false if the epoch no longer matches the current subscription,
    /// or the subscription is not waiting to go live.
    pub fn confirm_subscribed(&mut self, epoch: u64) -> bool {
        match &mut self.subscription {
            Some(subscription)
                if subscription.epoch == epoch
                    && subscription.state == ConnectionState::Connecting =>
            {
                subscription.state = ConnectionState::Subscribed;
                true
            }
            _ => false,
        }
    }

    /// Park the session after a transport failure.
    ///
    /// The subscription is dropped so a later [`Self::select_symbol`] starts a
    /// fresh epoch without unsubscribing, but the accumulated series and the
    /// latest snapshot are retained for inspection.
    pub fn connection_lost(&mut self) {
        self.subscription = None;
    }

    /// Offer one provider tick to the session.
    ///
    /// The tick is priced only when it carries the live epoch for the live
    /// symbol while the subscription is in [`ConnectionState::Subscribed`].
    /// Anything else is dropped as [`TickOutcome::Stale`].
    pub fn process_tick(&mut self, epoch: u64, tick: &TradeTick) -> TickOutcome {
        let live = self.subscription.as_ref().is_some_and(|subscription| {
            subscription.state == ConnectionState::Subscribed
                && subscription.epoch == epoch
                && subscription.symbol == tick.symbol
        });
        if !live {
            self.stats.ticks_stale += 1;
            return TickOutcome::Stale;
        }

        match self.price_tick(tick.price, tick.time) {
            Ok(point) => {
                self.stats.ticks_priced += 1;
                self.latest = Some(SessionSnapshot {
                    symbol: tick.symbol.clone(),
                    underlying_price: point.underlying,
                    option_price: point.option_price,
                    timestamp: point.timestamp.clone(),
                });
                self.series.append(point.clone());
                TickOutcome::Priced(point)
            }
            Err(error) => {
                self.stats.ticks_skipped += 1;
                TickOutcome::Skipped(error)
            }
        }
    }

    fn price_tick(&self, price: f64, time: DateTime<Utc>) -> Result<PricePoint, DomainError> {
        let option_price = pricing::call_price(
            price,
            self.contract.strike_price,
            self.contract.time_to_expiration_years,
            self.contract.risk_free_rate,
            self.contract.volatility,
        )?;
        Ok(PricePoint::new(
            clock::format_local(time),
            price,
            option_price,
        ))
    }

    /// Clear the accumulated series without touching the subscription.
    pub fn reset_series(&mut self) {
        self.series.reset();
    }

    /// Retire the session, returning the symbol to unsubscribe if one is live.
    pub fn shutdown(&mut self) -> Option<Symbol> {
        self.subscription
            .take()
            .filter(|subscription| subscription.state == ConnectionState::Subscribed)
            .map(|subscription| subscription.symbol)
    }
}
