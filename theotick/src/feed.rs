//! Async feed runner owning the provider connection.
//!
//! [`TickFeed::start`] spawns a background task that owns the WebSocket to
//! the provider and the command loop around a shared [`StreamingSession`].
//! Callers drive it through the returned [`FeedHandle`] and consume priced
//! points and failures from the [`SessionEvent`] receiver.

use crate::{
    Symbol,
    config::{ContractParameters, FeedConfig},
    error::FeedError,
    finnhub::{InboundMessage, OutboundMessage},
    series::PricePoint,
    session::{ConnectionState, StreamingSession, TickOutcome},
};
use derive_more::From;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite, tungstenite::Message,
};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands accepted by the feed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    /// Switch the live subscription to the provided symbol.
    SelectSymbol(Symbol),
    /// Clear the accumulated series without touching the subscription.
    ResetSeries,
    /// Unsubscribe, close the connection and stop the task.
    Shutdown,
}

/// Events emitted by the feed task.
#[derive(Debug, Clone, PartialEq, From)]
pub enum SessionEvent {
    /// New priced point appended to the series.
    Point(PricePoint),
    /// Connection, protocol or pricing failure.
    Error(FeedError),
}

/// Live tick feed pricing one symbol at a time.
#[derive(Debug)]
pub struct TickFeed {
    config: FeedConfig,
    session: Arc<Mutex<StreamingSession>>,
}

impl TickFeed {
    /// Construct a new [`TickFeed`] pricing the provided contract.
    pub fn new(config: FeedConfig, contract: ContractParameters) -> Self {
        Self::with_session(config, StreamingSession::new(contract))
    }

    /// Construct a new [`TickFeed`] around the provided session.
    pub fn with_session(config: FeedConfig, session: StreamingSession) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Spawn the feed task.
    ///
    /// Returns a [`FeedHandle`] for driving the task and a receiver for the
    /// events it emits. The task idles until the first
    /// [`FeedHandle::select_symbol`].
    pub fn start(self) -> (FeedHandle, mpsc::Receiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let session = Arc::clone(&self.session);
        let task = tokio::spawn(run_feed(
            self.config,
            self.session,
            command_rx,
            event_tx,
            state_tx,
        ));

        (
            FeedHandle {
                commands: command_tx,
                state: state_rx,
                session,
                task,
            },
            event_rx,
        )
    }
}

/// Handle for driving a running feed task.
#[derive(Debug)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    state: watch::Receiver<ConnectionState>,
    session: Arc<Mutex<StreamingSession>>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Switch the live subscription to the provided symbol.
    pub async fn select_symbol(&self, symbol: impl Into<Symbol>) -> Result<(), FeedError> {
        self.send(FeedCommand::SelectSymbol(symbol.into())).await
    }

    /// Clear the accumulated series without touching the subscription.
    pub async fn reset_series(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::ResetSeries).await
    }

    /// Return the current [`ConnectionState`].
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Return a watcher over [`ConnectionState`] transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Return a handle to the shared session for snapshot reads.
    pub fn session(&self) -> Arc<Mutex<StreamingSession>> {
        Arc::clone(&self.session)
    }

    /// Stop the feed task, unsubscribing the live symbol first.
    pub async fn shutdown(self) -> Result<(), FeedError> {
        self.send(FeedCommand::Shutdown).await?;
        self.task
            .await
            .map_err(|error| FeedError::Connection(error.to_string()))
    }

    async fn send(&self, command: FeedCommand) -> Result<(), FeedError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::Connection("feed task is not running".to_string()))
    }
}

/// Provider connection split for concurrent reading and writing, tagged with
/// the epoch its subscription was established under.
struct Connection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    epoch: u64,
}

enum Step {
    Inbound(Option<Result<Message, tungstenite::Error>>),
    Command(Option<FeedCommand>),
}

/// Main feed loop: multiplexes provider frames and caller commands.
async fn run_feed(
    config: FeedConfig,
    session: Arc<Mutex<StreamingSession>>,
    mut commands: mpsc::Receiver<FeedCommand>,
    events: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<ConnectionState>,
) {
    info!("Starting tick feed for {}", config.endpoint);
    let mut connection: Option<Connection> = None;

    loop {
        let step = match connection.as_mut() {
            Some(conn) => tokio::select! {
                message = conn.stream.next() => Step::Inbound(message),
                command = commands.recv() => Step::Command(command),
            },
            // Disconnected: nothing to poll but the command channel
            None => Step::Command(commands.recv().await),
        };

        match step {
            Step::Inbound(Some(Ok(Message::Text(text)))) => {
                let epoch = connection.as_ref().map_or(0, |conn| conn.epoch);
                handle_provider_message(&session, &events, epoch, text.as_str()).await;
            }
            Step::Inbound(Some(Ok(Message::Close(_)))) => {
                connection = None;
                let error = FeedError::Connection("provider closed the connection".to_string());
                fail_connection(&session, &events, &state_tx, error).await;
            }
            Step::Inbound(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                // Heartbeat frames - tungstenite answers pings automatically
            }
            Step::Inbound(Some(Ok(_))) => {}
            Step::Inbound(Some(Err(error))) => {
                connection = None;
                let error = FeedError::Connection(error.to_string());
                fail_connection(&session, &events, &state_tx, error).await;
            }
            Step::Inbound(None) => {
                connection = None;
                let error = FeedError::Connection("provider stream ended".to_string());
                fail_connection(&session, &events, &state_tx, error).await;
            }
            Step::Command(Some(FeedCommand::SelectSymbol(symbol))) => {
                connection =
                    handle_select_symbol(&config, &session, &events, &state_tx, connection, symbol)
                        .await;
            }
            Step::Command(Some(FeedCommand::ResetSeries)) => {
                session.lock().await.reset_series();
                debug!("Series reset");
            }
            Step::Command(Some(FeedCommand::Shutdown)) | Step::Command(None) => {
                let retired = session.lock().await.shutdown();
                if let Some(conn) = connection.as_mut() {
                    if let Some(symbol) = retired {
                        let message = OutboundMessage::Unsubscribe {
                            symbol: symbol.clone(),
                        };
                        if let Err(error) = send_control(&mut conn.sink, &message).await {
                            warn!("Failed to unsubscribe {} during shutdown: {}", symbol, error);
                        }
                    }
                    let _ = conn.sink.close().await;
                }
                let _ = state_tx.send(ConnectionState::Idle);
                info!("Tick feed stopped");
                break;
            }
        }
    }
}

/// Move the live subscription onto `symbol`, connecting first if required.
///
/// Returns the connection to keep polling, or `None` if it failed and the
/// session was parked.
async fn handle_select_symbol(
    config: &FeedConfig,
    session: &Arc<Mutex<StreamingSession>>,
    events: &mpsc::Sender<SessionEvent>,
    state_tx: &watch::Sender<ConnectionState>,
    connection: Option<Connection>,
    symbol: Symbol,
) -> Option<Connection> {
    let switch = match session.lock().await.select_symbol(symbol.clone()) {
        Some(switch) => switch,
        None => {
            debug!("Already subscribed to {}, ignoring reselect", symbol);
            return connection;
        }
    };

    let _ = state_tx.send(ConnectionState::Connecting);

    let mut conn = match connection {
        Some(conn) => conn,
        None => match open_connection(config).await {
            Ok(conn) => conn,
            Err(error) => {
                fail_connection(session, events, state_tx, error).await;
                return None;
            }
        },
    };
    conn.epoch = switch.epoch;

    if let Some(retired) = &switch.unsubscribe {
        let _ = state_tx.send(ConnectionState::Unsubscribing);
        let message = OutboundMessage::Unsubscribe {
            symbol: retired.clone(),
        };
        if let Err(error) = send_control(&mut conn.sink, &message).await {
            fail_connection(session, events, state_tx, error).await;
            return None;
        }
        debug!("Unsubscribed from {}", retired);
    }

    let message = OutboundMessage::Subscribe {
        symbol: switch.subscribe.clone(),
    };
    if let Err(error) = send_control(&mut conn.sink, &message).await {
        fail_connection(session, events, state_tx, error).await;
        return None;
    }

    // No subscription ack in the protocol: live once the send succeeds
    session.lock().await.confirm_subscribed(switch.epoch);
    let _ = state_tx.send(ConnectionState::Subscribed);
    info!("Subscribed to {} (epoch {})", switch.subscribe, switch.epoch);

    Some(conn)
}

/// Handle one text frame from the provider.
async fn handle_provider_message(
    session: &Arc<Mutex<StreamingSession>>,
    events: &mpsc::Sender<SessionEvent>,
    epoch: u64,
    text: &str,
) {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(InboundMessage::Trade { data }) => {
            // Only the first tick of a batch is consumed
            let Some(tick) = data.into_iter().next() else {
                return;
            };
            let outcome = session.lock().await.process_tick(epoch, &tick);
            match outcome {
                TickOutcome::Priced(point) => {
                    let _ = events.send(point.into()).await;
                }
                TickOutcome::Stale => {
                    debug!("Dropped stale tick for {}", tick.symbol);
                }
                TickOutcome::Skipped(error) => {
                    warn!("Pricing skipped tick for {}: {}", tick.symbol, error);
                    let _ = events.send(SessionEvent::Error(error.into())).await;
                }
            }
        }
        Ok(InboundMessage::Ping) => {
            debug!("Provider ping");
        }
        Ok(InboundMessage::Error { msg }) => {
            warn!("Provider error: {}", msg);
            let _ = events.send(SessionEvent::Error(FeedError::Protocol(msg))).await;
        }
        Ok(InboundMessage::Unsupported) => {
            debug!("Ignoring unsupported message: {}", text);
        }
        Err(error) => {
            error!("Failed to parse message: {}", error);
            debug!("Raw message: {}", text);
            let error = FeedError::Protocol(error.to_string());
            let _ = events.send(SessionEvent::Error(error)).await;
        }
    }
}

/// Open the provider WebSocket and split it for duplex use.
async fn open_connection(config: &FeedConfig) -> Result<Connection, FeedError> {
    let url = config.connect_url()?;
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|error| FeedError::Connection(error.to_string()))?;
    info!("Connected to {}", config.endpoint);

    let (sink, stream) = ws_stream.split();
    Ok(Connection {
        sink,
        stream,
        epoch: 0,
    })
}

/// Serialise and send one control message over the provider sink.
async fn send_control(
    sink: &mut SplitSink<WsStream, Message>,
    message: &OutboundMessage,
) -> Result<(), FeedError> {
    let json =
        serde_json::to_string(message).map_err(|error| FeedError::Protocol(error.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|error| FeedError::Connection(error.to_string()))
}

/// Park the session after a transport failure and surface the error.
async fn fail_connection(
    session: &Arc<Mutex<StreamingSession>>,
    events: &mpsc::Sender<SessionEvent>,
    state_tx: &watch::Sender<ConnectionState>,
    error: FeedError,
) {
    error!("Connection failed: {}", error);
    session.lock().await.connection_lost();
    let _ = state_tx.send(ConnectionState::Idle);
    let _ = events.send(error.into()).await;
}
