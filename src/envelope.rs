use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Envelope types reserved by the transport layer.
///
/// All other `type` values are opaque application payloads and pass through
/// the client untouched.
pub mod envelope_types {
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
}

/// A message exchanged over the channel: `{"type": <string>, "data": <payload>}`.
///
/// The reserved transport types get their own variants with typed payloads;
/// everything else lands in [`Envelope::Event`], which preserves the raw tag
/// and payload for the application. Envelopes are immutable once built.
///
/// # Example
///
/// ```
/// use gridfeed::Envelope;
///
/// let env = Envelope::subscribe("power-feed");
/// assert_eq!(
///     env.to_json(),
///     r#"{"type":"subscribe","data":{"channel":"power-feed"}}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Periodic liveness probe, client to server. Carries the send time as
    /// epoch milliseconds.
    Ping { timestamp: u64 },
    /// Liveness acknowledgment, server to client. Consumed by the client and
    /// never surfaced to the application.
    Pong { timestamp: Option<u64> },
    /// Request server-side delivery for a named channel.
    Subscribe { channel: String },
    /// Stop server-side delivery for a named channel.
    Unsubscribe { channel: String },
    /// Any envelope whose type is not reserved by the transport.
    Event { kind: String, data: Value },
}

/// The raw wire shape. Kept separate so the typed enum above can stay strict
/// about reserved types while remaining open to application types.
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    /// Build a liveness ping stamped with the current wall-clock time.
    pub fn ping() -> Self {
        Envelope::Ping {
            timestamp: now_millis(),
        }
    }

    /// Build a pong, echoing the ping timestamp when one is known.
    pub fn pong(timestamp: Option<u64>) -> Self {
        Envelope::Pong { timestamp }
    }

    /// Build a subscribe request for `channel`.
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Envelope::Subscribe {
            channel: channel.into(),
        }
    }

    /// Build an unsubscribe request for `channel`.
    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Envelope::Unsubscribe {
            channel: channel.into(),
        }
    }

    /// Build an application envelope with an arbitrary type tag and payload.
    pub fn event(kind: impl Into<String>, data: Value) -> Self {
        Envelope::Event {
            kind: kind.into(),
            data,
        }
    }

    /// The wire-level `type` tag of this envelope.
    pub fn kind(&self) -> &str {
        match self {
            Envelope::Ping { .. } => envelope_types::PING,
            Envelope::Pong { .. } => envelope_types::PONG,
            Envelope::Subscribe { .. } => envelope_types::SUBSCRIBE,
            Envelope::Unsubscribe { .. } => envelope_types::UNSUBSCRIBE,
            Envelope::Event { kind, .. } => kind,
        }
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> String {
        // WireEnvelope contains only string keys, so serialization cannot fail.
        serde_json::to_string(&self.to_wire()).unwrap_or_default()
    }

    /// Parse an inbound frame. Fails when the text is not valid JSON, the
    /// `type` tag is missing or not a string, or a reserved type is missing a
    /// required field.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse an inbound binary frame carrying UTF-8 JSON.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    fn to_wire(&self) -> WireEnvelope {
        match self {
            Envelope::Ping { timestamp } => WireEnvelope {
                kind: envelope_types::PING.to_string(),
                data: json!({ "timestamp": timestamp }),
            },
            Envelope::Pong { timestamp } => WireEnvelope {
                kind: envelope_types::PONG.to_string(),
                data: match timestamp {
                    Some(ts) => json!({ "timestamp": ts }),
                    None => json!({}),
                },
            },
            Envelope::Subscribe { channel } => WireEnvelope {
                kind: envelope_types::SUBSCRIBE.to_string(),
                data: json!({ "channel": channel }),
            },
            Envelope::Unsubscribe { channel } => WireEnvelope {
                kind: envelope_types::UNSUBSCRIBE.to_string(),
                data: json!({ "channel": channel }),
            },
            Envelope::Event { kind, data } => WireEnvelope {
                kind: kind.clone(),
                data: data.clone(),
            },
        }
    }

    fn from_wire(wire: WireEnvelope) -> Result<Self, String> {
        match wire.kind.as_str() {
            envelope_types::PING => {
                let timestamp = wire
                    .data
                    .get("timestamp")
                    .and_then(Value::as_u64)
                    .ok_or("ping envelope missing numeric data.timestamp")?;
                Ok(Envelope::Ping { timestamp })
            }
            envelope_types::PONG => Ok(Envelope::Pong {
                timestamp: wire.data.get("timestamp").and_then(Value::as_u64),
            }),
            envelope_types::SUBSCRIBE => Ok(Envelope::Subscribe {
                channel: required_channel(&wire.data, envelope_types::SUBSCRIBE)?,
            }),
            envelope_types::UNSUBSCRIBE => Ok(Envelope::Unsubscribe {
                channel: required_channel(&wire.data, envelope_types::UNSUBSCRIBE)?,
            }),
            _ => Ok(Envelope::Event {
                kind: wire.kind,
                data: wire.data,
            }),
        }
    }
}

fn required_channel(data: &Value, kind: &str) -> Result<String, String> {
    data.get("channel")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{kind} envelope missing string data.channel"))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireEnvelope::deserialize(deserializer)?;
        Envelope::from_wire(wire).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_wire_format() {
        let env = Envelope::subscribe("power-feed");
        assert_eq!(
            env.to_json(),
            r#"{"type":"subscribe","data":{"channel":"power-feed"}}"#
        );
    }

    #[test]
    fn test_ping_carries_timestamp() {
        let env = Envelope::ping();
        let Envelope::Ping { timestamp } = env else {
            panic!("expected ping");
        };
        assert!(timestamp > 0);

        let parsed = Envelope::from_json(&Envelope::Ping { timestamp }.to_json()).unwrap();
        assert_eq!(parsed, Envelope::Ping { timestamp });
    }

    #[test]
    fn test_pong_tolerates_any_payload() {
        let parsed = Envelope::from_json(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(parsed, Envelope::Pong { timestamp: None });

        let parsed = Envelope::from_json(r#"{"type":"pong","data":{"timestamp":42}}"#).unwrap();
        assert_eq!(parsed, Envelope::Pong { timestamp: Some(42) });

        let parsed = Envelope::from_json(r#"{"type":"pong","data":"whatever"}"#).unwrap();
        assert_eq!(parsed, Envelope::Pong { timestamp: None });
    }

    #[test]
    fn test_unknown_type_falls_through_as_event() {
        let parsed =
            Envelope::from_json(r#"{"type":"power-update","data":{"watts":1500}}"#).unwrap();
        assert_eq!(
            parsed,
            Envelope::event("power-update", json!({ "watts": 1500 }))
        );
        // Round-trips untouched.
        assert_eq!(
            parsed.to_json(),
            r#"{"type":"power-update","data":{"watts":1500}}"#
        );
    }

    #[test]
    fn test_missing_data_defaults_to_null() {
        let parsed = Envelope::from_json(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(parsed, Envelope::event("heartbeat", Value::Null));
    }

    #[test]
    fn test_malformed_frames_rejected() {
        // Not JSON at all.
        assert!(Envelope::from_json("not json").is_err());
        // No type tag.
        assert!(Envelope::from_json(r#"{"data":{}}"#).is_err());
        // Type is not a string.
        assert!(Envelope::from_json(r#"{"type":42,"data":{}}"#).is_err());
        // Reserved type with a missing required field.
        assert!(Envelope::from_json(r#"{"type":"subscribe","data":{}}"#).is_err());
        assert!(Envelope::from_json(r#"{"type":"unsubscribe","data":{"channel":7}}"#).is_err());
        assert!(Envelope::from_json(r#"{"type":"ping","data":{}}"#).is_err());
    }

    #[test]
    fn test_kind_accessor() {
        assert_eq!(Envelope::ping().kind(), "ping");
        assert_eq!(Envelope::subscribe("a").kind(), "subscribe");
        assert_eq!(Envelope::event("telemetry", Value::Null).kind(), "telemetry");
    }
}
