use crate::envelope::Envelope;
use std::collections::HashSet;

/// Remembers which logical channels the client wants.
///
/// The set is the source of truth for what *should* be subscribed; it
/// survives reconnection and is replayed after every open. Only explicit
/// unsubscribes (or client teardown) shrink it.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionRegistry {
    channels: HashSet<String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent insert. Returns `true` if the channel was newly added.
    pub fn subscribe(&mut self, channel: &str) -> bool {
        self.channels.insert(channel.to_string())
    }

    /// Idempotent removal. Returns `true` if the channel was present.
    pub fn unsubscribe(&mut self, channel: &str) -> bool {
        self.channels.remove(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Subscribe envelopes for every desired channel, for replay after an
    /// open. Order across channels is unspecified; server-side subscribes
    /// are idempotent so only completeness matters.
    pub fn replay(&self) -> Vec<Envelope> {
        self.channels
            .iter()
            .map(|c| Envelope::subscribe(c.clone()))
            .collect()
    }
}
