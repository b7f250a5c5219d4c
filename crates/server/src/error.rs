//! Error types for the listener and connections.

use xdbg_protocol::ParseError;

/// Errors produced while talking to a connected debugger engine.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid reply: {0}")]
    Parse(#[from] ParseError),

    #[error("handshake timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}

impl ConnectionError {
    /// Whether the socket is unusable after this error.
    ///
    /// A reply that fails to decode leaves the framing intact, so the
    /// connection keeps serving commands.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConnectionError::Parse(_))
    }
}

/// Errors produced while setting up the listening socket.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
