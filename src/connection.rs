use crate::envelope::Envelope;
use crate::error::Error;
use crate::handler::CloseReason;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// Type alias for the underlying WebSocket stream
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// One physical connection to the server hub.
///
/// Created fresh for every attempt and never reused; the owning client
/// splits it into a sink and a source once the transport is up. The
/// connection translates raw frames to and from [`Envelope`]s and holds no
/// retry policy of its own.
pub(crate) struct Connection {
    stream: WsStream,
}

impl Connection {
    /// Establish the transport, bounded by `connect_timeout`. The result is
    /// only ever observed by the caller through the returned value; nothing
    /// here panics or blocks beyond the timeout.
    pub async fn open(url: &str, connect_timeout: Duration) -> Result<Self, Error> {
        match timeout(connect_timeout, connect_async(url)).await {
            Ok(Ok((stream, _response))) => {
                debug!("transport established to {url}");
                Ok(Self { stream })
            }
            Ok(Err(e)) => Err(Error::ConnectFailed {
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectFailed {
                reason: format!("connection timeout after {connect_timeout:?}"),
            }),
        }
    }

    pub fn into_halves(self) -> (FrameSink, FrameSource) {
        let (write, read) = self.stream.split();
        (
            FrameSink {
                write,
                closed: false,
            },
            FrameSource { read },
        )
    }
}

/// Outbound half: serializes envelopes onto the wire.
pub(crate) struct FrameSink {
    write: WsWrite,
    closed: bool,
}

impl FrameSink {
    /// Serialize and write one envelope. A no-op once the sink is closed;
    /// queueing and retries are the owner's concern, not the transport's.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), Error> {
        if self.closed {
            trace!("send on closed sink ignored");
            return Ok(());
        }
        self.write
            .send(Message::Text(envelope.to_json()))
            .await
            .map_err(Error::WebSocket)
    }

    /// Answer a transport-level ping.
    pub async fn transport_pong(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.write
            .send(Message::Pong(payload))
            .await
            .map_err(Error::WebSocket)
    }

    /// Request orderly shutdown. Guarded so a second call is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.write.send(Message::Close(None)).await;
    }
}

/// Inbound half: reads raw frames and yields parsed events.
pub(crate) struct FrameSource {
    read: WsRead,
}

/// What the inbound half produced.
pub(crate) enum Inbound {
    /// A well-formed envelope.
    Envelope(Envelope),
    /// A frame that failed to parse as an envelope. Non-fatal.
    Malformed(serde_json::Error),
    /// A transport-level ping that needs a transport-level pong.
    TransportPing(Vec<u8>),
    /// The connection is gone.
    Closed(CloseReason),
    /// A transport error; the connection is unusable afterwards.
    Lost(Error),
}

impl FrameSource {
    /// Yield the next inbound event. Transport-level pongs and raw
    /// continuation frames are consumed silently.
    pub async fn next(&mut self) -> Inbound {
        loop {
            match self.read.next().await {
                None => return Inbound::Closed(CloseReason::StreamEnded),
                Some(Ok(Message::Text(text))) => {
                    return match Envelope::from_json(&text) {
                        Ok(envelope) => Inbound::Envelope(envelope),
                        Err(e) => Inbound::Malformed(e),
                    };
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return match Envelope::from_slice(&bytes) {
                        Ok(envelope) => Inbound::Envelope(envelope),
                        Err(e) => Inbound::Malformed(e),
                    };
                }
                Some(Ok(Message::Ping(payload))) => return Inbound::TransportPing(payload),
                Some(Ok(Message::Pong(_))) => {
                    trace!("transport pong received");
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = match frame {
                        Some(frame) => CloseReason::ServerClose {
                            code: u16::from(frame.code),
                            reason: frame.reason.into_owned(),
                        },
                        None => CloseReason::ServerClose {
                            code: 1005,
                            reason: String::new(),
                        },
                    };
                    return Inbound::Closed(reason);
                }
                Some(Ok(Message::Frame(_))) => {
                    trace!("raw frame ignored");
                }
                Some(Err(e)) => return Inbound::Lost(Error::WebSocket(e)),
            }
        }
    }
}
