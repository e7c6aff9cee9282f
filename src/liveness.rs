use std::time::Instant;
use tokio::time::Duration;

/// Tracks liveness traffic for a single connection.
///
/// Liveness here is advisory: the tracker records ping/pong instants so the
/// client can log staleness, but a missing pong never force-closes the
/// connection.
#[derive(Debug)]
pub(crate) struct LivenessTracker {
    started: Instant,

    /// Time of last ping sent
    last_ping_sent: Option<Instant>,

    /// Time of last pong received
    last_pong_received: Option<Instant>,

    pings_sent: u64,
    pongs_received: u64,
}

impl LivenessTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_ping_sent: None,
            last_pong_received: None,
            pings_sent: 0,
            pongs_received: 0,
        }
    }

    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
        self.pings_sent += 1;
    }

    pub fn record_pong_received(&mut self) {
        self.last_pong_received = Some(Instant::now());
        self.pongs_received += 1;
    }

    /// Elapsed time since the last pong, or since the connection opened if
    /// no pong has arrived yet.
    pub fn last_pong_age(&self) -> Duration {
        self.last_pong_received
            .unwrap_or(self.started)
            .elapsed()
    }

    /// Whether pings have gone unanswered for longer than `threshold`.
    /// Advisory only.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.pings_sent > 0 && self.last_pong_age() >= threshold
    }
}
