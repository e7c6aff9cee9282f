use thiserror::Error;

/// Categorizes errors for handler decision-making.
///
/// This is a lightweight, copyable representation of the error type that is
/// passed to the `on_error` callback so applications can react per class
/// without matching on the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport-level failure on an established connection.
    Transport,
    /// A connection attempt failed (timeout, refused, handshake error).
    ConnectFailed,
    /// An inbound frame failed to parse as an envelope. Never fatal.
    MalformedFrame,
    /// Automatic reconnection paused for this session; an explicit
    /// `reconnect()` call is required to resume.
    SessionExhausted,
    /// The lifetime reconnection budget is spent. Terminal for the instance.
    LifetimeExhausted,
}

/// Errors produced by the channel transport.
///
/// None of these cross the public API as return values; they are absorbed
/// into state transitions and surfaced through the `on_error` callback.
#[derive(Error, Debug)]
pub enum Error {
    /// WebSocket protocol or socket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection attempt failed
    #[error("connection failed: {reason}")]
    ConnectFailed { reason: String },

    /// Inbound frame did not parse as an envelope
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// Per-session reconnection ceiling reached
    #[error("automatic reconnection paused after {attempts} attempts this session")]
    SessionExhausted { attempts: u32 },

    /// Absolute reconnection ceiling reached
    #[error("reconnection budget exhausted after {attempts} lifetime attempts")]
    LifetimeExhausted { attempts: u32 },
}

impl Error {
    /// Get the kind of this error for decision-making.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WebSocket(_) => ErrorKind::Transport,
            Error::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            Error::Envelope(_) => ErrorKind::MalformedFrame,
            Error::SessionExhausted { .. } => ErrorKind::SessionExhausted,
            Error::LifetimeExhausted { .. } => ErrorKind::LifetimeExhausted,
        }
    }
}
