use super::error::Result;
use async_trait::async_trait;

/// A raw frame received from or sent over the duplex stream
#[derive(Debug, Clone)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WireMessage {
    /// Get the frame as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireMessage::Text(s) => Some(s),
            WireMessage::Binary(_) => None,
        }
    }

    /// Get the frame as binary, if it is binary
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            WireMessage::Text(_) => None,
            WireMessage::Binary(b) => Some(b),
        }
    }

    /// Check if the frame is text
    pub fn is_text(&self) -> bool {
        matches!(self, WireMessage::Text(_))
    }
}

/// Trait for parsing inbound wire frames into typed messages
///
/// The parser runs on the hot path of the feed client. A parse failure
/// means the frame is dropped and logged; it must never tear down the
/// connection.
#[async_trait]
pub trait WireParser: Send + Sync + 'static {
    /// The parsed message type handed to the consumer
    type Message: Send + std::fmt::Debug + 'static;

    /// Parse a raw wire frame into a typed message
    async fn parse(&self, frame: WireMessage) -> Result<Self::Message>;
}
