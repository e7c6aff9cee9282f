//! # gridfeed
//!
//! A real-time telemetry channel client with auto-reconnection, liveness
//! pings, and channel-scoped subscriptions.
//!
//! ## Features
//!
//! - **Auto-reconnection** with bounded exponential backoff (1.5x factor,
//!   30 s ceiling) and per-session plus lifetime attempt budgets
//! - **Channel subscriptions** that survive reconnection and are replayed
//!   after every open
//! - **Liveness pings** on a fixed cadence, with pongs consumed internally
//! - **Single-writer state machine**: one driver task owns the connection,
//!   so callbacks never overlap and no public operation blocks or throws
//! - **Metrics** for observability
//!
//! ## Example
//!
//! ```ignore
//! use gridfeed::{ChannelClient, ChannelConfig, ChannelHandler, Envelope};
//!
//! struct TelemetryHandler;
//!
//! impl ChannelHandler for TelemetryHandler {
//!     async fn on_message(&self, envelope: Envelope) {
//!         println!("update: {:?}", envelope);
//!     }
//! }
//!
//! let config = ChannelConfig::builder("wss://hub.example.com/ws").build()?;
//! let client = ChannelClient::connect(config, TelemetryHandler);
//! client.subscribe("power-feed");
//! ```

mod client;
mod config;
mod connection;
mod envelope;
mod error;
mod handler;
mod liveness;
mod metrics;
mod reconnect;
mod subscription;

pub use client::{ChannelClient, ChannelState};
pub use config::{ChannelConfig, ChannelConfigBuilder, ConfigError, ReconnectConfig};
pub use envelope::{envelope_types, Envelope};
pub use error::{Error, ErrorKind};
pub use handler::{ChannelHandler, CloseReason, SessionInfo};
pub use metrics::{ChannelMetrics, MetricsSnapshot};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, BACKOFF_MULTIPLIER, MAX_RECONNECT_DELAY};

/// Result type for gridfeed operations
pub type Result<T> = std::result::Result<T, Error>;
