//! Update sources.
//!
//! Two interchangeable feeds behind one trait: the live WebSocket stream
//! and a REST polling fallback. The scheduler consumes [`SourceEvent`]s
//! and never knows which one is active.

use crate::model::StreamMessage;
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamlink::traits::{StreamLinkError, WireMessage, WireParser};
use streamlink::{FeedClient, FeedConfig, FeedEvent};
use tracing::{debug, info, warn};

/// What a source can hand to the engine on a frame tick
#[derive(Debug)]
pub enum SourceEvent {
    /// A parsed inbound message
    Message(StreamMessage),
    Connected,
    Disconnected,
    /// Reconnect attempt number
    Reconnecting(usize),
    /// Retry budget exhausted; the source will produce nothing further
    Failed,
}

/// A feed of row updates. Drained non-blockingly once per frame tick.
#[async_trait]
pub trait UpdateSource: Send {
    /// Pull everything available right now without blocking
    fn drain(&mut self) -> Vec<SourceEvent>;

    /// Stop the source, cancelling any timers it owns
    async fn shutdown(self: Box<Self>);
}

// ============================================================================
// Streaming source
// ============================================================================

/// Parses raw text frames into [`StreamMessage`]s
pub struct TickerWireParser;

#[async_trait]
impl WireParser for TickerWireParser {
    type Message = StreamMessage;

    async fn parse(&self, frame: WireMessage) -> streamlink::Result<StreamMessage> {
        let text = frame
            .as_text()
            .ok_or_else(|| StreamLinkError::ParseError("binary frame on a text feed".into()))?;
        StreamMessage::parse(text).map_err(|e| StreamLinkError::ParseError(e.to_string()))
    }
}

fn map_feed_event(event: FeedEvent) -> Option<SourceEvent> {
    match event {
        FeedEvent::Connected => Some(SourceEvent::Connected),
        FeedEvent::Disconnected => Some(SourceEvent::Disconnected),
        FeedEvent::Reconnecting(attempt) => Some(SourceEvent::Reconnecting(attempt)),
        FeedEvent::Failed => Some(SourceEvent::Failed),
        FeedEvent::Error(e) => {
            warn!("[Source] Feed error: {}", e);
            None
        }
    }
}

/// Live duplex stream source
pub struct StreamSource {
    client: FeedClient<TickerWireParser>,
}

impl StreamSource {
    pub fn connect(config: FeedConfig) -> Self {
        Self {
            client: FeedClient::connect(config, TickerWireParser),
        }
    }
}

#[async_trait]
impl UpdateSource for StreamSource {
    fn drain(&mut self) -> Vec<SourceEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.client.try_recv_event() {
            if let Some(mapped) = map_feed_event(event) {
                events.push(mapped);
            }
        }
        while let Some(message) = self.client.try_recv_message() {
            events.push(SourceEvent::Message(message));
        }
        events
    }

    async fn shutdown(self: Box<Self>) {
        if let Err(e) = self.client.shutdown().await {
            warn!("[Source] Stream shutdown error: {}", e);
        }
    }
}

// ============================================================================
// Polling source
// ============================================================================

/// REST polling fallback: fetches a full snapshot on a fixed interval
pub struct PollSource {
    events_rx: Receiver<SourceEvent>,
    running: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl PollSource {
    pub fn start(url: String, interval: Duration) -> Self {
        let (events_tx, events_rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(poll_loop(url, interval, events_tx, Arc::clone(&running)));

        Self {
            events_rx,
            running,
            task: Some(task),
        }
    }
}

async fn poll_loop(
    url: String,
    interval: Duration,
    events_tx: Sender<SourceEvent>,
    running: Arc<AtomicBool>,
) {
    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut connected = false;

    info!("[Source] Polling {} every {:?}", url, interval);

    while running.load(Ordering::Acquire) {
        ticker.tick().await;
        if !running.load(Ordering::Acquire) {
            break;
        }

        let body = match client.get(&url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp.text().await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match body {
            Ok(text) => {
                if !connected {
                    connected = true;
                    let _ = events_tx.send(SourceEvent::Connected);
                }
                match StreamMessage::parse(&text) {
                    Ok(message) => {
                        if events_tx.send(SourceEvent::Message(message)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("[Source] Dropping malformed poll response: {}", e),
                }
            }
            Err(e) => {
                warn!("[Source] Poll failed: {}", e);
                if connected {
                    connected = false;
                    let _ = events_tx.send(SourceEvent::Disconnected);
                }
            }
        }
    }

    debug!("[Source] Poll loop exiting");
}

#[async_trait]
impl UpdateSource for PollSource {
    fn drain(&mut self) -> Vec<SourceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn shutdown(mut self: Box<Self>) {
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}
