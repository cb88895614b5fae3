//! Async feed client: owns the connect/reconnect loop and the message loop.
//!
//! Parsed messages are forwarded to the consumer over an unbounded channel
//! in arrival order; lifecycle changes are surfaced as [`FeedEvent`]s. All
//! retry decisions are delegated to the [`ConnectionSupervisor`].

use crate::core::config::FeedConfig;
use crate::core::connection_state::{
    AtomicConnectionState, AtomicFeedMetrics, ConnectionState, FeedMetrics,
};
use crate::core::supervisor::{ConnDirective, ConnEvent, ConnectionSupervisor};
use crate::traits::{StreamLinkError, WireMessage, WireParser};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Internal command messages for client control
#[derive(Debug)]
enum ClientCommand {
    /// Send a message over the channel
    Send(WireMessage),
    /// Shut the client down
    Shutdown,
}

/// Lifecycle events surfaced to the consumer
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connected to the endpoint
    Connected,
    /// Disconnected from the endpoint
    Disconnected,
    /// Reconnecting (attempt number)
    Reconnecting(usize),
    /// Retry budget exhausted; no further attempts will be made
    Failed,
    /// Error occurred
    Error(String),
}

/// Feed client handle.
///
/// The actual I/O runs in a spawned task; this handle exposes channels for
/// parsed messages and lifecycle events plus `send`/`shutdown` control.
pub struct FeedClient<P>
where
    P: WireParser,
{
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicFeedMetrics>,
    command_tx: Sender<ClientCommand>,
    message_rx: Receiver<P::Message>,
    event_rx: Receiver<FeedEvent>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
}

impl<P> FeedClient<P>
where
    P: WireParser,
{
    /// Spawn the client task and start connecting.
    pub fn connect(config: FeedConfig, parser: P) -> Self {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let metrics = Arc::new(AtomicFeedMetrics::new());
        // true = keep running, false = shutdown requested
        let shutdown_flag = Arc::new(AtomicBool::new(true));

        let (command_tx, command_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();

        let task_handle = {
            let state = Arc::clone(&state);
            let metrics = Arc::clone(&metrics);
            let shutdown_flag = Arc::clone(&shutdown_flag);

            tokio::spawn(async move {
                run_client(
                    config,
                    parser,
                    state,
                    metrics,
                    shutdown_flag,
                    command_rx,
                    message_tx,
                    event_tx,
                )
                .await;
            })
        };

        Self {
            state,
            metrics,
            command_tx,
            message_rx,
            event_rx,
            task_handle: Some(task_handle),
            shutdown_flag,
        }
    }

    /// Send a message over the channel
    pub fn send(&self, message: WireMessage) -> crate::Result<()> {
        self.command_tx
            .send(ClientCommand::Send(message))
            .map_err(|e| StreamLinkError::ChannelSend(e.to_string()))
    }

    /// Current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Check if connected
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Current counters snapshot
    pub fn metrics(&self) -> FeedMetrics {
        self.metrics.snapshot(self.state.get())
    }

    /// Try to receive a parsed message (non-blocking)
    pub fn try_recv_message(&self) -> Option<P::Message> {
        self.message_rx.try_recv().ok()
    }

    /// Channel of parsed messages, for select-style consumption
    pub fn message_rx(&self) -> &Receiver<P::Message> {
        &self.message_rx
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<FeedEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Shut the client down, cancelling heartbeat and reconnect timers
    pub async fn shutdown(mut self) -> crate::Result<()> {
        info!("[Feed] Shutting down client");

        self.shutdown_flag.store(false, Ordering::Release);
        self.state.set(ConnectionState::ShuttingDown);
        let _ = self.command_tx.send(ClientCommand::Shutdown);

        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }

        info!("[Feed] Client shut down");
        Ok(())
    }
}

/// Sleep in small slices so a shutdown request interrupts the backoff wait.
async fn interruptible_sleep(duration: Duration, shutdown_flag: &AtomicBool) -> bool {
    let check_interval = Duration::from_millis(100);
    let mut elapsed = Duration::ZERO;

    while elapsed < duration {
        if !shutdown_flag.load(Ordering::Acquire) {
            return false;
        }
        let slice = std::cmp::min(check_interval, duration - elapsed);
        tokio::time::sleep(slice).await;
        elapsed += slice;
    }
    true
}

/// Main client task loop
#[allow(clippy::too_many_arguments)]
async fn run_client<P>(
    config: FeedConfig,
    parser: P,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicFeedMetrics>,
    shutdown_flag: Arc<AtomicBool>,
    command_rx: Receiver<ClientCommand>,
    message_tx: Sender<P::Message>,
    event_tx: Sender<FeedEvent>,
) where
    P: WireParser,
{
    let FeedConfig {
        url,
        heartbeat,
        subscriptions,
        reconnect_policy,
        stable_connection_window,
    } = config;

    let mut supervisor = ConnectionSupervisor::new(
        Arc::clone(&state),
        reconnect_policy,
        stable_connection_window,
    );

    loop {
        if !shutdown_flag.load(Ordering::Acquire) {
            debug!("[Feed] Shutdown flag set, exiting main loop");
            break;
        }

        state.set(if supervisor.attempts() == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        if supervisor.attempts() > 0 {
            let _ = event_tx.send(FeedEvent::Reconnecting(supervisor.attempts()));
            metrics.increment_reconnects();
        }

        let directive = match connect_async(&url).await {
            Ok((ws_stream, _)) => {
                info!("[Feed] Connected to {}", url);
                let opened_at = Instant::now();
                supervisor.on_event(ConnEvent::Opened);
                let _ = event_tx.send(FeedEvent::Connected);

                if let Err(e) = handle_connection(
                    ws_stream,
                    &heartbeat,
                    &subscriptions,
                    &parser,
                    &state,
                    &metrics,
                    &shutdown_flag,
                    &command_rx,
                    &message_tx,
                )
                .await
                {
                    error!("[Feed] Connection error: {}", e);
                    let _ = event_tx.send(FeedEvent::Error(e.to_string()));
                }

                let _ = event_tx.send(FeedEvent::Disconnected);
                supervisor.on_event(ConnEvent::Closed {
                    uptime: opened_at.elapsed(),
                })
            }
            Err(e) => {
                error!("[Feed] Failed to connect: {}", e);
                let _ = event_tx.send(FeedEvent::Error(e.to_string()));
                supervisor.on_event(ConnEvent::ConnectFailed)
            }
        };

        if !shutdown_flag.load(Ordering::Acquire) {
            break;
        }

        match directive {
            ConnDirective::Continue => {}
            ConnDirective::RetryAfter(delay) => {
                if !interruptible_sleep(delay, &shutdown_flag).await {
                    break;
                }
            }
            ConnDirective::GiveUp => {
                if state.get() == ConnectionState::Failed {
                    let _ = event_tx.send(FeedEvent::Failed);
                }
                break;
            }
        }
    }

    info!("[Feed] Client task exiting");
}

/// Handle one open connection: subscriptions, heartbeat, message loop.
#[allow(clippy::too_many_arguments)]
async fn handle_connection<P>(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    heartbeat_config: &Option<(Duration, WireMessage)>,
    subscriptions: &[WireMessage],
    parser: &P,
    state: &AtomicConnectionState,
    metrics: &AtomicFeedMetrics,
    shutdown_flag: &AtomicBool,
    command_rx: &Receiver<ClientCommand>,
    message_tx: &Sender<P::Message>,
) -> crate::Result<()>
where
    P: WireParser,
{
    let (mut write, mut read) = ws_stream.split();

    for sub in subscriptions {
        let msg = wire_to_tungstenite(sub);
        write
            .send(msg)
            .await
            .map_err(|e| StreamLinkError::WebSocket(format!("Failed to send subscription: {}", e)))?;
        metrics.increment_sent();
        debug!("[Feed] Sent subscription message");
    }

    let heartbeat = heartbeat_config.as_ref().map(|(interval, payload)| {
        crate::core::heartbeat::spawn_heartbeat(*interval, payload.clone())
    });

    let result = message_loop(
        &mut write,
        &mut read,
        parser,
        state,
        metrics,
        shutdown_flag,
        command_rx,
        heartbeat.as_ref().map(|(_, _, rx)| rx),
        message_tx,
    )
    .await;

    // Signal the heartbeat task; it checks the channel on its next tick
    if let Some((_handle, shutdown_tx, _)) = heartbeat {
        let _ = shutdown_tx.send(());
    }

    result
}

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsSource = futures::stream::SplitStream<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
>;

/// Main message processing loop
#[allow(clippy::too_many_arguments)]
async fn message_loop<P>(
    write: &mut WsSink,
    read: &mut WsSource,
    parser: &P,
    state: &AtomicConnectionState,
    metrics: &AtomicFeedMetrics,
    shutdown_flag: &AtomicBool,
    command_rx: &Receiver<ClientCommand>,
    heartbeat_rx: Option<&Receiver<WireMessage>>,
    message_tx: &Sender<P::Message>,
) -> crate::Result<()>
where
    P: WireParser,
{
    loop {
        if !shutdown_flag.load(Ordering::Acquire) || state.is_shutting_down() {
            debug!("[Feed] Shutdown detected in message loop, closing connection");
            let _ = write.close().await;
            return Ok(());
        }

        tokio::select! {
            // Inbound frames
            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        metrics.increment_received();

                        if let Some(frame) = tungstenite_to_wire(msg) {
                            // Parse inline: per-key ordering relies on
                            // messages being forwarded in arrival order
                            match parser.parse(frame).await {
                                Ok(parsed) => {
                                    if message_tx.send(parsed).is_err() {
                                        debug!("[Feed] Message channel closed");
                                        return Ok(());
                                    }
                                }
                                Err(e) => {
                                    warn!("[Feed] Dropping malformed frame: {}", e);
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("[Feed] WebSocket error: {}", e);
                        return Err(StreamLinkError::WebSocket(e.to_string()));
                    }
                    None => {
                        warn!("[Feed] Stream closed by peer");
                        return Err(StreamLinkError::ConnectionClosed("Stream ended".into()));
                    }
                }
            }

            // Control commands (poll with timeout to keep the select fair)
            cmd = async {
                let rx = command_rx.clone();
                tokio::task::spawn_blocking(move || {
                    rx.recv_timeout(Duration::from_millis(100))
                }).await.ok()
            } => {
                match cmd {
                    Some(Ok(ClientCommand::Send(msg))) => {
                        let tung_msg = wire_to_tungstenite(&msg);
                        write.send(tung_msg).await.map_err(|e| {
                            StreamLinkError::WebSocket(e.to_string())
                        })?;
                        metrics.increment_sent();
                    }
                    Some(Ok(ClientCommand::Shutdown)) => {
                        info!("[Feed] Received shutdown command");
                        state.set(ConnectionState::ShuttingDown);
                        let _ = write.close().await;
                        return Ok(());
                    }
                    Some(Err(_)) => {
                        // recv timeout, keep looping
                    }
                    None => {
                        debug!("[Feed] Command channel closed");
                        return Ok(());
                    }
                }
            }

            // Keep-alive probes from the heartbeat task
            hb = async {
                if let Some(rx) = heartbeat_rx {
                    let rx = rx.clone();
                    tokio::task::spawn_blocking(move || {
                        rx.recv_timeout(Duration::from_millis(100))
                    }).await.ok().and_then(|r| r.ok())
                } else {
                    std::future::pending().await
                }
            } => {
                if let Some(msg) = hb {
                    let tung_msg = wire_to_tungstenite(&msg);
                    write.send(tung_msg).await.map_err(|e| {
                        StreamLinkError::WebSocket(format!("Failed to send heartbeat: {}", e))
                    })?;
                    metrics.increment_sent();
                    debug!("[Feed] Heartbeat sent");
                }
            }
        }
    }
}

/// Convert WireMessage to tungstenite Message
fn wire_to_tungstenite(msg: &WireMessage) -> Message {
    match msg {
        WireMessage::Text(text) => Message::Text(text.clone()),
        WireMessage::Binary(data) => Message::Binary(data.clone()),
    }
}

/// Convert tungstenite Message to WireMessage
fn tungstenite_to_wire(msg: Message) -> Option<WireMessage> {
    match msg {
        Message::Text(text) => Some(WireMessage::Text(text)),
        Message::Binary(data) => Some(WireMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
