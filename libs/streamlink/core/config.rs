//! Feed client configuration.

use crate::traits::{LinearBackoff, ReconnectPolicy, WireMessage};
use std::time::Duration;

/// Default heartbeat probe interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default base delay for linear reconnect backoff
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default cap on consecutive reconnect attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: usize = 10;

/// A connection that stays up this long resets the attempt counter
pub const DEFAULT_STABLE_CONNECTION_WINDOW: Duration = Duration::from_secs(60);

/// Configuration for a [`crate::FeedClient`]
pub struct FeedConfig {
    /// Stream endpoint URL (ws:// or wss://)
    pub url: String,
    /// Heartbeat interval and payload; `None` disables the probe
    pub heartbeat: Option<(Duration, WireMessage)>,
    /// Messages sent right after the channel opens (subscriptions etc.)
    pub subscriptions: Vec<WireMessage>,
    /// Reconnect policy consulted after abnormal closes
    pub reconnect_policy: Box<dyn ReconnectPolicy>,
    /// Uptime after which the attempt counter is considered stale
    pub stable_connection_window: Duration,
}

impl FeedConfig {
    /// Create a config with the default heartbeat and linear backoff
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            heartbeat: Some((
                DEFAULT_HEARTBEAT_INTERVAL,
                WireMessage::Text(r#"{"op":"ping"}"#.to_string()),
            )),
            subscriptions: Vec::new(),
            reconnect_policy: Box::new(LinearBackoff::new(
                DEFAULT_RECONNECT_BASE_DELAY,
                DEFAULT_MAX_RECONNECT_ATTEMPTS,
            )),
            stable_connection_window: DEFAULT_STABLE_CONNECTION_WINDOW,
        }
    }

    /// Override the heartbeat interval and payload
    pub fn with_heartbeat(mut self, interval: Duration, payload: WireMessage) -> Self {
        self.heartbeat = Some((interval, payload));
        self
    }

    /// Disable the heartbeat probe entirely
    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = None;
        self
    }

    /// Add a subscription message sent on every (re)connect
    pub fn with_subscription(mut self, message: WireMessage) -> Self {
        self.subscriptions.push(message);
        self
    }

    /// Replace the reconnect policy
    pub fn with_reconnect_policy(mut self, policy: Box<dyn ReconnectPolicy>) -> Self {
        self.reconnect_policy = policy;
        self
    }
}
