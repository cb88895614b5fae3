//! # StreamLink
//!
//! A small duplex-stream connection layer for high-frequency market feeds.
//!
//! ## Features
//!
//! - **Explicit state machine**: connection lifecycle is a set of named
//!   states driven by discrete events, testable without a transport
//! - **Pluggable reconnect policies**: linear backoff with a hard attempt
//!   cap, fixed delay, or never
//! - **Heartbeat task**: periodic keep-alive probe while connected
//! - **Parse-and-forward**: inbound frames are parsed by a trait seam and
//!   handed to the consumer over a channel; malformed frames are dropped
//!   and logged, never fatal

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    client, config, connection_state, heartbeat, supervisor,
    client::{FeedClient, FeedEvent},
    config::FeedConfig,
    connection_state::{AtomicConnectionState, AtomicFeedMetrics, ConnectionState, FeedMetrics},
    supervisor::{ConnDirective, ConnEvent, ConnectionSupervisor},
};

/// Type alias for Result with StreamLinkError
pub type Result<T> = std::result::Result<T, traits::StreamLinkError>;
