use crate::{
    Symbol,
    error::{DomainError, FeedError},
};
use url::Url;

/// Default provider WebSocket endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://ws.finnhub.io";

/// Instrument universe offered to selectors by default.
pub const DEFAULT_UNIVERSE: [&str; 9] = [
    "AAPL", "MSFT", "GOOGL", "NVDA", "META", "TSLA", "NFLX", "INTC", "AMD",
];

/// Streaming connection configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Provider WebSocket endpoint.
    pub endpoint: String,
    /// Provider API token, appended to the connect URL as the `token` query
    /// parameter.
    pub api_token: String,
    /// Closed set of symbols a selector may subscribe to.
    pub universe: Vec<Symbol>,
    /// Maximum buffered session events before the feed applies backpressure.
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: String::new(),
            universe: DEFAULT_UNIVERSE.into_iter().map(Symbol::from).collect(),
            channel_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    /// Create a configuration with the default endpoint and universe.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            ..Default::default()
        }
    }

    /// Set the provider endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the instrument universe.
    pub fn with_universe(mut self, universe: impl IntoIterator<Item = Symbol>) -> Self {
        self.universe = universe.into_iter().collect();
        self
    }

    /// Set the event channel buffer size.
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    /// Full connect URL with the API token applied.
    pub fn connect_url(&self) -> Result<Url, FeedError> {
        let mut url = Url::parse(&self.endpoint).map_err(|error| {
            FeedError::Connection(format!("invalid endpoint {}: {error}", self.endpoint))
        })?;
        url.query_pairs_mut().append_pair("token", &self.api_token);
        Ok(url)
    }
}

/// Parameters of the single contract priced on every tick.
///
/// Fixed for the lifetime of a session; the underlying trade price is the
/// only per-tick input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContractParameters {
    /// Option strike price.
    pub strike_price: f64,
    /// Time to expiration in years.
    pub time_to_expiration_years: f64,
    /// Annualised risk-free rate.
    pub risk_free_rate: f64,
    /// Annualised volatility of the underlying.
    pub volatility: f64,
}

impl Default for ContractParameters {
    fn default() -> Self {
        Self {
            strike_price: 100.0,
            time_to_expiration_years: 0.25,
            risk_free_rate: 0.015,
            volatility: 0.20,
        }
    }
}

impl ContractParameters {
    /// Check the pricing preconditions up front rather than on the first
    /// tick. The kernel re-checks the same bounds on every call.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.volatility <= 0.0 {
            return Err(DomainError::NonPositiveVolatility(self.volatility));
        }
        if self.time_to_expiration_years <= 0.0 {
            return Err(DomainError::NonPositiveExpiry(self.time_to_expiration_years));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = FeedConfig::new("secret")
            .with_endpoint("ws://127.0.0.1:9001")
            .with_universe([Symbol::from("AAPL"), Symbol::from("MSFT")])
            .with_channel_buffer_size(500);

        assert_eq!(config.endpoint, "ws://127.0.0.1:9001");
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.universe.len(), 2);
        assert_eq!(config.channel_buffer_size, 500);
    }

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.universe.len(), 9);
        assert_eq!(config.universe[0], Symbol::from("AAPL"));
        assert_eq!(config.channel_buffer_size, 1000);
    }

    #[test]
    fn test_connect_url_appends_token() {
        let config = FeedConfig::new("abc123").with_endpoint("ws://127.0.0.1:9001");
        let url = config.connect_url().unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/?token=abc123");
    }

    #[test]
    fn test_connect_url_rejects_invalid_endpoint() {
        let config = FeedConfig::new("abc123").with_endpoint("not a url");
        assert!(config.connect_url().is_err());
    }

    #[test]
    fn test_default_contract_parameters() {
        let contract = ContractParameters::default();
        assert_eq!(contract.strike_price, 100.0);
        assert_eq!(contract.time_to_expiration_years, 0.25);
        assert_eq!(contract.risk_free_rate, 0.015);
        assert_eq!(contract.volatility, 0.20);
        assert!(contract.validate().is_ok());
    }

    #[test]
    fn test_contract_parameters_validate() {
        struct TestCase {
            contract: ContractParameters,
            expected: Result<(), DomainError>,
        }

        let tests = vec![
            TestCase {
                // TC0: defaults are valid
                contract: ContractParameters::default(),
                expected: Ok(()),
            },
            TestCase {
                // TC1: zero volatility
                contract: ContractParameters {
                    volatility: 0.0,
                    ..Default::default()
                },
                expected: Err(DomainError::NonPositiveVolatility(0.0)),
            },
            TestCase {
                // TC2: expired contract
                contract: ContractParameters {
                    time_to_expiration_years: -0.5,
                    ..Default::default()
                },
                expected: Err(DomainError::NonPositiveExpiry(-0.5)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(test.contract.validate(), test.expected, "TC{} failed", index);
        }
    }
}
