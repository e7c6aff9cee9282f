use crate::envelope::Envelope;
use crate::error::ErrorKind;
use std::future::Future;

/// Connection session information passed to handlers
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Number of channel subscriptions replayed for this session
    pub subscription_count: usize,
    /// Whether this open follows an earlier connection (vs initial connect)
    pub is_reconnect: bool,
    /// Session attempt number that produced this open (0 for a first try)
    pub reconnect_attempt: u32,
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The application called `disconnect()`.
    ManualClose,
    /// The server sent a close frame.
    ServerClose { code: u16, reason: String },
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// A transport error tore the connection down.
    Transport,
    /// The connection attempt never completed.
    ConnectFailed,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ManualClose => write!(f, "manual close"),
            CloseReason::ServerClose { code, reason } if reason.is_empty() => {
                write!(f, "server close ({code})")
            }
            CloseReason::ServerClose { code, reason } => {
                write!(f, "server close ({code}: {reason})")
            }
            CloseReason::StreamEnded => write!(f, "stream ended"),
            CloseReason::Transport => write!(f, "transport error"),
            CloseReason::ConnectFailed => write!(f, "connect failed"),
        }
    }
}

/// Trait that applications implement to consume channel events.
///
/// The client owns the connection lifecycle, reconnection, and liveness;
/// the handler consumes inbound envelopes and lifecycle notifications. All
/// callbacks for one client instance are invoked sequentially from a single
/// driver task, so implementations never observe concurrent calls.
///
/// # Example
///
/// ```ignore
/// use gridfeed::{ChannelHandler, Envelope, SessionInfo};
///
/// struct TelemetryHandler;
///
/// impl ChannelHandler for TelemetryHandler {
///     async fn on_message(&self, envelope: Envelope) {
///         println!("telemetry: {:?}", envelope);
///     }
///
///     async fn on_open(&self, session: &SessionInfo) {
///         println!("connected (reconnect: {})", session.is_reconnect);
///     }
/// }
/// ```
pub trait ChannelHandler: Send + Sync + 'static {
    /// Called for every inbound envelope except `"pong"`, which the client
    /// consumes internally.
    fn on_message(&self, envelope: Envelope) -> impl Future<Output = ()> + Send;

    /// Called after every successful open, once subscriptions have been
    /// replayed.
    fn on_open(&self, _session: &SessionInfo) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called whenever the connection closes, deliberately or not. Automatic
    /// reconnection (if any) is scheduled after this returns.
    fn on_close(&self, _reason: &CloseReason) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called for every error the transport absorbs: transient transport
    /// failures, malformed frames, and retry exhaustion. Never fatal by
    /// itself.
    fn on_error(&self, _kind: ErrorKind, _message: &str) -> impl Future<Output = ()> + Send {
        async {}
    }
}
