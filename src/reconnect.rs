use crate::config::ReconnectConfig;
use std::time::Duration;

/// Hard ceiling on any single backoff delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);

/// Multiplicative backoff factor. 1.5 converges quickly without the
/// network-storm behavior of pure doubling.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Outcome of consulting the policy after a connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Schedule a new attempt after `delay`. `attempt` is the 1-based
    /// session attempt number this schedules.
    Retry { delay: Duration, attempt: u32 },
    /// The close was deliberate; do nothing until an explicit reconnect.
    ManualClose,
    /// Session ceiling reached; only an explicit reconnect resumes.
    SessionExhausted,
    /// Lifetime ceiling reached; terminal for this instance.
    LifetimeExhausted,
}

/// Decides whether and when to attempt a new connection after a loss.
///
/// Tracks two counters: `session_attempts` resets to zero on every
/// successful open, `lifetime_attempts` never resets. A healthy period of
/// connectivity forgives the session counter, while the lifetime ceiling
/// acts as a circuit breaker for environments where the server is
/// permanently unreachable.
#[derive(Debug)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    session_limit: u32,
    lifetime_limit: u32,
    session_attempts: u32,
    lifetime_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base_delay: config.base_delay,
            session_limit: config.session_attempts_limit,
            lifetime_limit: config.lifetime_attempts_limit,
            session_attempts: 0,
            lifetime_attempts: 0,
        }
    }

    /// Consult the policy after an unintended close (or a deliberate one,
    /// signalled by `manual_close`). A `Retry` decision consumes one attempt
    /// from both counters.
    pub fn decide(&mut self, manual_close: bool) -> ReconnectDecision {
        if manual_close {
            return ReconnectDecision::ManualClose;
        }
        if self.lifetime_attempts >= self.lifetime_limit {
            return ReconnectDecision::LifetimeExhausted;
        }
        if self.session_attempts >= self.session_limit {
            return ReconnectDecision::SessionExhausted;
        }

        let delay = self.delay_for_attempt(self.session_attempts);
        self.session_attempts += 1;
        self.lifetime_attempts += 1;
        ReconnectDecision::Retry {
            delay,
            attempt: self.session_attempts,
        }
    }

    /// Calculate the backoff delay for a given session attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.base_delay.as_millis() as f64 * BACKOFF_MULTIPLIER.powi(attempt as i32);
        let capped = raw.min(MAX_RECONNECT_DELAY.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Record a successful open: forgives the session counter, never the
    /// lifetime counter.
    pub fn record_open(&mut self) {
        self.session_attempts = 0;
    }

    /// Attempts since the last successful open.
    pub fn session_attempts(&self) -> u32 {
        self.session_attempts
    }

    /// Attempts since the instance was created.
    pub fn lifetime_attempts(&self) -> u32 {
        self.lifetime_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base_ms: u64, session: u32, lifetime: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(&ReconnectConfig {
            base_delay: Duration::from_millis(base_ms),
            session_attempts_limit: session,
            lifetime_attempts_limit: lifetime,
        })
    }

    #[test]
    fn test_delay_sequence_for_default_base() {
        let policy = policy(3000, 5, 10);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(3000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(4500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(6750));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(10125));

        // Should cap at 30 seconds.
        assert_eq!(policy.delay_for_attempt(20), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_delays_monotonically_non_decreasing() {
        let policy = policy(3000, 5, 10);
        let mut prev = Duration::ZERO;
        for attempt in 0..12 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= prev, "delay decreased at attempt {attempt}");
            prev = delay;
        }
    }

    #[test]
    fn test_manual_close_is_terminal() {
        let mut policy = policy(100, 5, 10);
        assert_eq!(policy.decide(true), ReconnectDecision::ManualClose);
        // No attempt consumed.
        assert_eq!(policy.session_attempts(), 0);
        assert_eq!(policy.lifetime_attempts(), 0);
    }

    #[test]
    fn test_session_ceiling_pauses_retries() {
        let mut policy = policy(100, 2, 10);

        assert!(matches!(
            policy.decide(false),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.decide(false),
            ReconnectDecision::Retry { attempt: 2, .. }
        ));
        assert_eq!(policy.decide(false), ReconnectDecision::SessionExhausted);
        // Repeated consultations keep refusing without consuming attempts.
        assert_eq!(policy.decide(false), ReconnectDecision::SessionExhausted);
        assert_eq!(policy.lifetime_attempts(), 2);
    }

    #[test]
    fn test_open_resets_session_but_not_lifetime() {
        let mut policy = policy(100, 2, 10);

        policy.decide(false);
        policy.decide(false);
        assert_eq!(policy.session_attempts(), 2);
        assert_eq!(policy.lifetime_attempts(), 2);

        policy.record_open();
        assert_eq!(policy.session_attempts(), 0);
        assert_eq!(policy.lifetime_attempts(), 2);

        // Backoff restarts from the base delay after a successful open.
        assert!(matches!(
            policy.decide(false),
            ReconnectDecision::Retry {
                delay,
                attempt: 1
            } if delay == Duration::from_millis(100)
        ));
    }

    #[test]
    fn test_lifetime_ceiling_is_absolute() {
        let mut policy = policy(100, 3, 3);

        for expected in 1..=3u32 {
            assert!(matches!(
                policy.decide(false),
                ReconnectDecision::Retry { attempt, .. } if attempt == expected
            ));
        }
        assert_eq!(policy.decide(false), ReconnectDecision::LifetimeExhausted);

        // A successful open forgives the session counter only; the lifetime
        // ceiling still refuses.
        policy.record_open();
        assert_eq!(policy.decide(false), ReconnectDecision::LifetimeExhausted);
        assert_eq!(policy.lifetime_attempts(), 3);
    }

    #[test]
    fn test_refused_server_scenario() {
        // Base config: 3000 ms delay, 5 attempts per session. Server refuses
        // every attempt. Expect delays 3000/4500/6750/10125/15187 and then a
        // hard stop with lifetime_attempts == 5.
        let mut policy = policy(3000, 5, 10);
        let mut delays = Vec::new();

        loop {
            match policy.decide(false) {
                ReconnectDecision::Retry { delay, .. } => delays.push(delay.as_millis() as u64),
                ReconnectDecision::SessionExhausted => break,
                other => panic!("unexpected decision {other:?}"),
            }
        }

        assert_eq!(delays, vec![3000, 4500, 6750, 10125, 15187]);
        assert_eq!(policy.lifetime_attempts(), 5);
    }
}
