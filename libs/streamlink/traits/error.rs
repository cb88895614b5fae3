use thiserror::Error;

/// Main error type for streamlink
#[derive(Error, Debug)]
pub enum StreamLinkError {
    /// WebSocket connection error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Frame parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reconnection gave up
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectionFailed { attempts: usize, reason: String },

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidState(String),
}

/// Result type for streamlink operations
pub type Result<T> = std::result::Result<T, StreamLinkError>;
