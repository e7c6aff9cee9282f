//! Example: consuming a facility power telemetry feed
//!
//! This example connects to a telemetry hub, subscribes to the live power
//! and environment channels, and logs every update pushed by the server.
//!
//! Run with: cargo run --example power_feed -- ws://127.0.0.1:9001/ws

use gridfeed::{
    ChannelClient, ChannelConfig, ChannelHandler, CloseReason, Envelope, ErrorKind, SessionInfo,
};
use tracing::{info, warn, Level};

/// Logs every telemetry update pushed over the channel.
struct PowerFeedHandler;

impl ChannelHandler for PowerFeedHandler {
    async fn on_message(&self, envelope: Envelope) {
        match envelope {
            Envelope::Event { kind, data } => {
                info!("update [{kind}]: {data}");
            }
            other => {
                info!("transport envelope: {:?}", other);
            }
        }
    }

    async fn on_open(&self, session: &SessionInfo) {
        info!(
            "connected ({} subscriptions, reconnect: {})",
            session.subscription_count, session.is_reconnect
        );
    }

    async fn on_close(&self, reason: &CloseReason) {
        info!("disconnected: {reason}");
    }

    async fn on_error(&self, kind: ErrorKind, message: &str) {
        warn!("channel error ({kind:?}): {message}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/ws".to_string());

    info!("connecting to {url}");

    let config = ChannelConfig::builder(url.as_str())
        .reconnect_delay(std::time::Duration::from_secs(2))
        .ping_interval(std::time::Duration::from_secs(15))
        .build()?;

    let client = ChannelClient::connect(config, PowerFeedHandler);
    client.subscribe("power-feed");
    client.subscribe("env-sensors");

    info!("Running... Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    let snapshot = client.metrics().snapshot();
    info!("Final metrics:");
    info!("  Connections: {}", snapshot.connections_total);
    info!("  Reconnections: {}", snapshot.reconnections_total);
    info!("  Messages received: {}", snapshot.messages_received_total);
    info!("  Pings sent: {}", snapshot.pings_sent_total);
    info!("  Uptime: {:?}", snapshot.total_uptime);

    client.disconnect();
    Ok(())
}
