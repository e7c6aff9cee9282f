use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for observability
///
/// Counters and gauges for monitoring channel health. Use `snapshot()` to
/// get a point-in-time view of all metrics, or the individual getters for
/// specific values.
///
/// # Example
/// ```ignore
/// let metrics = client.metrics();
///
/// println!("Connections: {}", metrics.connections());
/// println!("Messages received: {}", metrics.messages_received());
///
/// let snapshot = metrics.snapshot();
/// ```
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    connections_total: AtomicU64,
    reconnections_total: AtomicU64,
    messages_received_total: AtomicU64,
    messages_sent_total: AtomicU64,
    pings_sent_total: AtomicU64,
    pongs_received_total: AtomicU64,
    malformed_frames_total: AtomicU64,
    dropped_sends_total: AtomicU64,
    subscribes_replayed_total: AtomicU64,
    errors_total: AtomicU64,

    /// Instant-bearing state, updated on connect/disconnect and inbound data
    link: RwLock<LinkStats>,
}

#[derive(Debug, Default)]
struct LinkStats {
    is_connected: bool,
    last_connected_at: Option<Instant>,
    last_message_at: Option<Instant>,
    total_uptime: Duration,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Getters ==========

    /// Get total connections established
    pub fn connections(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    /// Get total reconnections
    pub fn reconnections(&self) -> u64 {
        self.reconnections_total.load(Ordering::Relaxed)
    }

    /// Get total envelopes received
    pub fn messages_received(&self) -> u64 {
        self.messages_received_total.load(Ordering::Relaxed)
    }

    /// Get total envelopes sent
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent_total.load(Ordering::Relaxed)
    }

    /// Get total liveness pings sent
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent_total.load(Ordering::Relaxed)
    }

    /// Get total liveness pongs received
    pub fn pongs_received(&self) -> u64 {
        self.pongs_received_total.load(Ordering::Relaxed)
    }

    /// Get total inbound frames dropped as malformed
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames_total.load(Ordering::Relaxed)
    }

    /// Get total sends dropped while not connected
    pub fn dropped_sends(&self) -> u64 {
        self.dropped_sends_total.load(Ordering::Relaxed)
    }

    /// Get total subscribe envelopes replayed after opens
    pub fn subscribes_replayed(&self) -> u64 {
        self.subscribes_replayed_total.load(Ordering::Relaxed)
    }

    /// Get total errors
    pub fn errors(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    /// Whether the channel is currently connected
    pub fn is_connected(&self) -> bool {
        self.link.read().is_connected
    }

    // ========== Recording methods (called internally) ==========

    pub(crate) fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        let mut link = self.link.write();
        link.is_connected = true;
        link.last_connected_at = Some(Instant::now());
    }

    pub(crate) fn record_reconnection(&self) {
        self.reconnections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnection(&self) {
        let mut link = self.link.write();
        // Also called after failed attempts; only count time actually spent
        // connected.
        if link.is_connected {
            if let Some(connected_at) = link.last_connected_at {
                link.total_uptime += connected_at.elapsed();
            }
        }
        link.is_connected = false;
    }

    pub(crate) fn record_message_received(&self) {
        self.messages_received_total.fetch_add(1, Ordering::Relaxed);
        self.link.write().last_message_at = Some(Instant::now());
    }

    pub(crate) fn record_message_sent(&self) {
        self.messages_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ping(&self) {
        self.pings_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pong(&self) {
        self.pongs_received_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed_frame(&self) {
        self.malformed_frames_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_send(&self) {
        self.dropped_sends_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_subscribe_replayed(&self) {
        self.subscribes_replayed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all metrics for export
    pub fn snapshot(&self) -> MetricsSnapshot {
        let link = self.link.read();

        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Acquire),
            reconnections_total: self.reconnections_total.load(Ordering::Acquire),
            messages_received_total: self.messages_received_total.load(Ordering::Acquire),
            messages_sent_total: self.messages_sent_total.load(Ordering::Acquire),
            pings_sent_total: self.pings_sent_total.load(Ordering::Acquire),
            pongs_received_total: self.pongs_received_total.load(Ordering::Acquire),
            malformed_frames_total: self.malformed_frames_total.load(Ordering::Acquire),
            dropped_sends_total: self.dropped_sends_total.load(Ordering::Acquire),
            subscribes_replayed_total: self.subscribes_replayed_total.load(Ordering::Acquire),
            errors_total: self.errors_total.load(Ordering::Acquire),
            is_connected: link.is_connected,
            time_since_connected: link.last_connected_at.map(|t| t.elapsed()),
            time_since_last_message: link.last_message_at.map(|t| t.elapsed()),
            total_uptime: link.total_uptime,
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub reconnections_total: u64,
    pub messages_received_total: u64,
    pub messages_sent_total: u64,
    pub pings_sent_total: u64,
    pub pongs_received_total: u64,
    pub malformed_frames_total: u64,
    pub dropped_sends_total: u64,
    pub subscribes_replayed_total: u64,
    pub errors_total: u64,
    pub is_connected: bool,
    /// Duration since last successful connection (None if never connected)
    pub time_since_connected: Option<Duration>,
    /// Duration since last envelope received (None if none yet)
    pub time_since_last_message: Option<Duration>,
    pub total_uptime: Duration,
}
