//! Finnhub WebSocket wire types.
//!
//! Outbound control messages are `{"type": "subscribe", "symbol": "AAPL"}` /
//! `{"type": "unsubscribe", "symbol": "AAPL"}`. Inbound messages are tagged
//! the same way: `trade` carries a batch of ticks under `data`, `ping` is a
//! provider heartbeat, and `error` reports a provider-side failure such as
//! an invalid symbol. Every other message type is ignored.

use crate::{Symbol, de};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Control messages sent to the provider over the live socket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Subscribe { symbol: Symbol },
    Unsubscribe { symbol: Symbol },
}

/// Messages received from the provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Batch of trade ticks for subscribed symbols.
    Trade { data: Vec<TradeTick> },
    /// Provider heartbeat.
    Ping,
    /// Provider-reported failure, e.g. an invalid symbol.
    Error { msg: String },
    /// Any other message type.
    #[serde(other)]
    Unsupported,
}

/// One reported trade for a subscribed symbol.
///
/// Unknown fields such as volume and trade conditions are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeTick {
    /// Ticker symbol the trade belongs to.
    #[serde(rename = "s")]
    pub symbol: Symbol,
    /// Last trade price.
    #[serde(rename = "p")]
    pub price: f64,
    /// Trade timestamp.
    #[serde(rename = "t", deserialize_with = "de::de_i64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_serialisation() {
        struct TestCase {
            input: OutboundMessage,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0
                input: OutboundMessage::Subscribe {
                    symbol: Symbol::from("AAPL"),
                },
                expected: r#"{"type":"subscribe","symbol":"AAPL"}"#,
            },
            TestCase {
                // TC1
                input: OutboundMessage::Unsubscribe {
                    symbol: Symbol::from("TSLA"),
                },
                expected: r#"{"type":"unsubscribe","symbol":"TSLA"}"#,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::to_string(&test.input).unwrap();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_inbound_message_deserialisation() {
        struct TestCase {
            input: &'static str,
            expected: InboundMessage,
        }

        let tests = vec![
            TestCase {
                // TC0: trade with provider extras (volume, conditions) and
                // the tag out of first position
                input: r#"{"data":[{"c":null,"p":218.98,"s":"AAPL","t":1722522394497,"v":25}],"type":"trade"}"#,
                expected: InboundMessage::Trade {
                    data: vec![TradeTick {
                        symbol: Symbol::from("AAPL"),
                        price: 218.98,
                        time: DateTime::from_timestamp_millis(1722522394497).unwrap(),
                    }],
                },
            },
            TestCase {
                // TC1: multi-tick batch
                input: r#"{"type":"trade","data":[{"s":"MSFT","p":425.5,"t":1722522394497},{"s":"MSFT","p":425.55,"t":1722522394501}]}"#,
                expected: InboundMessage::Trade {
                    data: vec![
                        TradeTick {
                            symbol: Symbol::from("MSFT"),
                            price: 425.5,
                            time: DateTime::from_timestamp_millis(1722522394497).unwrap(),
                        },
                        TradeTick {
                            symbol: Symbol::from("MSFT"),
                            price: 425.55,
                            time: DateTime::from_timestamp_millis(1722522394501).unwrap(),
                        },
                    ],
                },
            },
            TestCase {
                // TC2: empty batch
                input: r#"{"type":"trade","data":[]}"#,
                expected: InboundMessage::Trade { data: vec![] },
            },
            TestCase {
                // TC3: heartbeat
                input: r#"{"type":"ping"}"#,
                expected: InboundMessage::Ping,
            },
            TestCase {
                // TC4: provider error
                input: r#"{"type":"error","msg":"Invalid symbol: FAKE"}"#,
                expected: InboundMessage::Error {
                    msg: "Invalid symbol: FAKE".to_string(),
                },
            },
            TestCase {
                // TC5: unclassified message type
                input: r#"{"type":"news","headline":"markets up"}"#,
                expected: InboundMessage::Unsupported,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<InboundMessage>(test.input).unwrap();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_inbound_message_rejects_malformed() {
        let inputs = [
            // TC0: not JSON
            "not json",
            // TC1: no type tag
            r#"{"data":[]}"#,
            // TC2: trade tick missing price and time
            r#"{"type":"trade","data":[{"s":"AAPL"}]}"#,
        ];

        for (index, input) in inputs.into_iter().enumerate() {
            assert!(
                serde_json::from_str::<InboundMessage>(input).is_err(),
                "TC{} failed",
                index
            );
        }
    }
}
