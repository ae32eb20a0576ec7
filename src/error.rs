use thiserror::Error;

pub type Result<T> = std::result::Result<T, LatencyError>;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LatencyError {
    /// Initial WebSocket connect failed. Fatal for the client.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Server could not bind its listener. Fatal for the server.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Read or write failure on an established channel.
    #[error("transport: {0}")]
    Transport(String),

    /// Frame did not decode as a sample.
    #[error("malformed sample frame: {0}")]
    Malformed(String),

    /// Peer closed the channel.
    #[error("channel closed by peer")]
    ChannelClosed,

    /// Percentiles were requested on an empty sample set.
    #[error("insufficient data: no latency samples were collected")]
    InsufficientData,

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LatencyError {
    /// Read-side failures that end a measurement run normally.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Malformed(_) | Self::ChannelClosed
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for LatencyError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::ChannelClosed
            }
            other => Self::Transport(other.to_string()),
        }
    }
}
