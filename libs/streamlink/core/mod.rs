//! Core connection machinery: state cell, supervisor state machine,
//! heartbeat task, configuration, and the async feed client.

pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod supervisor;

pub use client::{FeedClient, FeedEvent};
pub use config::FeedConfig;
pub use connection_state::{AtomicConnectionState, AtomicFeedMetrics, ConnectionState, FeedMetrics};
pub use supervisor::{ConnDirective, ConnEvent, ConnectionSupervisor};
