//! Trait seams for the connection layer.
//!
//! The consumer plugs in a [`WireParser`] for its wire format and a
//! [`ReconnectPolicy`] for its retry behavior; everything else is owned
//! by the [`crate::FeedClient`].

pub mod error;
pub mod parser;
pub mod reconnect;

pub use error::{Result, StreamLinkError};
pub use parser::{WireMessage, WireParser};
pub use reconnect::{FixedDelay, LinearBackoff, NeverReconnect, ReconnectPolicy};
