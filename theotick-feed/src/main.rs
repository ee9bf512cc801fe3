use chrono::Utc;
use std::process::exit;
use std::time::Duration;
use theotick::{ContractParameters, FeedConfig, SessionEvent, Symbol, TickFeed, clock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    init_logging();

    info!("Starting theotick feed");

    let Ok(api_token) = std::env::var("FINNHUB_TOKEN") else {
        error!("FINNHUB_TOKEN must be set to a Finnhub API token");
        exit(1);
    };

    let mut config = FeedConfig::new(api_token);
    // Configurable via FEED_ENDPOINT env var (default: wss://ws.finnhub.io)
    if let Ok(endpoint) = std::env::var("FEED_ENDPOINT") {
        config = config.with_endpoint(endpoint);
    }

    let ticker = std::env::var("TICKER").unwrap_or_else(|_| "AAPL".to_string());
    let symbol = Symbol::new(ticker.trim().to_uppercase());
    if !config.universe.contains(&symbol) {
        error!(
            "Unknown ticker {}, expected one of: {}",
            symbol,
            config
                .universe
                .iter()
                .map(Symbol::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
        exit(1);
    }

    let contract = contract_from_env();
    if let Err(error) = contract.validate() {
        error!("Invalid contract parameters: {}", error);
        exit(1);
    }

    info!(
        "Pricing {} call: strike {}, expiry {}y, rate {}, vol {}",
        symbol,
        contract.strike_price,
        contract.time_to_expiration_years,
        contract.risk_free_rate,
        contract.volatility
    );

    let feed = TickFeed::new(config, contract);
    let (handle, mut events) = feed.start();
    let session = handle.session();

    if let Err(error) = handle.select_symbol(symbol).await {
        error!("Failed to select symbol: {}", error);
        exit(1);
    }

    let mut clock_ticks = interval(Duration::from_secs(1));
    let mut last_open: Option<bool> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            event = events.recv() => match event {
                Some(SessionEvent::Point(point)) => {
                    info!(
                        "Tick {} -> theo {:.4} ({})",
                        point.underlying, point.option_price, point.timestamp
                    );
                }
                Some(SessionEvent::Error(error)) if error.is_connection() => {
                    // Leave restarts to the process supervisor
                    error!("Connection lost: {}", error);
                    break;
                }
                Some(SessionEvent::Error(error)) => {
                    warn!("Feed error: {}", error);
                }
                None => {
                    error!("Feed task stopped unexpectedly");
                    break;
                }
            },
            _ = clock_ticks.tick() => {
                let now = Utc::now();
                let open = clock::is_open(now);
                debug!(
                    "{} market {}",
                    clock::format_local(now),
                    if open { "open" } else { "closed" }
                );
                if last_open != Some(open) {
                    info!("Market is {}", if open { "open" } else { "closed" });
                    last_open = Some(open);
                }
            }
        }
    }

    {
        let session = session.lock().await;
        if let Some(snapshot) = session.snapshot() {
            info!(
                "Last snapshot: {} {} -> {:.4} at {}",
                snapshot.symbol,
                snapshot.underlying_price,
                snapshot.option_price,
                snapshot.timestamp
            );
        }
        let stats = session.stats();
        info!(
            "Session stats: {} priced, {} stale, {} skipped, {} points buffered",
            stats.ticks_priced,
            stats.ticks_stale,
            stats.ticks_skipped,
            session.series().len()
        );
    }

    if let Err(error) = handle.shutdown().await {
        warn!("Feed shutdown failed: {}", error);
    }
}

/// Read contract parameters from the environment, falling back to defaults
/// for anything unset or unparseable.
fn contract_from_env() -> ContractParameters {
    let defaults = ContractParameters::default();
    ContractParameters {
        strike_price: env_f64("OPTION_STRIKE", defaults.strike_price),
        time_to_expiration_years: env_f64("OPTION_EXPIRY_YEARS", defaults.time_to_expiration_years),
        risk_free_rate: env_f64("RISK_FREE_RATE", defaults.risk_free_rate),
        volatility: env_f64("VOLATILITY", defaults.volatility),
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
