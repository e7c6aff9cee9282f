use crate::config::ChannelConfig;
use crate::connection::{Connection, FrameSink, FrameSource, Inbound};
use crate::envelope::Envelope;
use crate::error::Error;
use crate::handler::{ChannelHandler, CloseReason, SessionInfo};
use crate::liveness::LivenessTracker;
use crate::metrics::ChannelMetrics;
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::subscription::SubscriptionRegistry;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// Connection state of a channel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Commands from the public handle to the driver task
#[derive(Debug)]
enum Command {
    /// Send an envelope, best-effort
    Send(Envelope),
    /// Add a channel subscription
    Subscribe(String),
    /// Remove a channel subscription
    Unsubscribe(String),
    /// Explicit manual reconnect
    Reconnect,
    /// Deliberate close; cancels timers and schedules nothing
    Disconnect,
}

/// What the driver does next after leaving its current phase.
#[derive(Debug)]
enum Phase {
    Connect,
    Backoff(Duration),
    Idle,
    Done,
}

/// The public face of one real-time channel.
///
/// Construction spawns a driver task that owns the connection, the
/// reconnection policy, the subscription registry, and the liveness timer.
/// Every public operation is fire-and-forget: results are observed through
/// handler callbacks and [`ChannelClient::state`], never as return values
/// or exceptions.
///
/// Dropping the client aborts the driver, which deterministically tears
/// down any open connection and all timers.
///
/// # Example
///
/// ```ignore
/// use gridfeed::{ChannelClient, ChannelConfig, ChannelHandler, Envelope};
///
/// let config = ChannelConfig::builder("wss://hub.example.com/ws").build()?;
/// let client = ChannelClient::connect(config, TelemetryHandler);
/// client.subscribe("power-feed");
/// ```
pub struct ChannelClient {
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ChannelState>,
    metrics: Arc<ChannelMetrics>,
    driver: JoinHandle<()>,
}

impl ChannelClient {
    /// Create the client and start connecting immediately.
    ///
    /// Never fails synchronously; connection failures surface through the
    /// handler's `on_error`/`on_close` callbacks.
    pub fn connect<H: ChannelHandler>(config: ChannelConfig, handler: H) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Disconnected);
        let metrics = Arc::new(ChannelMetrics::new());

        let driver = Driver {
            policy: ReconnectPolicy::new(&config.reconnect),
            config,
            handler: Arc::new(handler),
            registry: SubscriptionRegistry::new(),
            manual_close: false,
            rx_closed: false,
            opens: 0,
            state_tx,
            metrics: metrics.clone(),
            command_rx,
        };
        let driver = tokio::spawn(driver.run());

        Self {
            command_tx,
            state_rx,
            metrics,
            driver,
        }
    }

    /// Send an envelope if the channel is open.
    ///
    /// At-most-once, best-effort: while not open the envelope is dropped
    /// (and, if no reconnection is already pending, one policy-approved
    /// attempt is triggered in hopes of future delivery). Never queued.
    pub fn send(&self, envelope: Envelope) {
        self.dispatch(Command::Send(envelope));
    }

    /// Subscribe to a named channel. Idempotent; replayed after every
    /// reconnect until [`ChannelClient::unsubscribe`] is called.
    pub fn subscribe(&self, channel: impl Into<String>) {
        self.dispatch(Command::Subscribe(channel.into()));
    }

    /// Unsubscribe from a named channel. Idempotent.
    pub fn unsubscribe(&self, channel: impl Into<String>) {
        self.dispatch(Command::Unsubscribe(channel.into()));
    }

    /// Explicitly request a reconnect. This is the only way to resume after
    /// the per-session retry budget is spent or after `disconnect()`.
    pub fn reconnect(&self) {
        self.dispatch(Command::Reconnect);
    }

    /// Deliberately close the channel. Cancels the liveness timer and any
    /// pending reconnection; no automatic reconnect follows.
    pub fn disconnect(&self) {
        self.dispatch(Command::Disconnect);
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    /// Whether the channel is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// A watch receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Get the metrics for this client
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        self.metrics.clone()
    }

    fn dispatch(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            debug!("channel driver is gone; command ignored");
        }
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        // Tear down the driver so no timer or socket outlives the handle.
        self.driver.abort();
    }
}

/// The single task that owns all mutable channel state.
///
/// Commands, inbound frames, and timer firings are interleaved as discrete
/// non-overlapping steps of one task, so the state machine, counters, and
/// subscription set need no locks.
struct Driver<H: ChannelHandler> {
    config: ChannelConfig,
    handler: Arc<H>,
    registry: SubscriptionRegistry,
    policy: ReconnectPolicy,
    /// Set before a deliberate close so the close handling cannot race into
    /// a reconnect; reset at the start of every connection attempt.
    manual_close: bool,
    /// The public handle went away; finish up and exit.
    rx_closed: bool,
    /// Successful opens so far, for reconnect bookkeeping.
    opens: u64,
    state_tx: watch::Sender<ChannelState>,
    metrics: Arc<ChannelMetrics>,
    command_rx: mpsc::UnboundedReceiver<Command>,
}

impl<H: ChannelHandler> Driver<H> {
    async fn run(mut self) {
        let mut phase = Phase::Connect;
        loop {
            phase = match phase {
                Phase::Connect => self.run_connection().await,
                Phase::Backoff(delay) => self.run_backoff(delay).await,
                Phase::Idle => self.run_idle().await,
                Phase::Done => break,
            };
        }
        self.set_state(ChannelState::Disconnected);
        debug!("channel driver stopped");
    }

    fn set_state(&self, state: ChannelState) {
        self.state_tx.send_replace(state);
    }

    /// One full connection lifecycle: attempt, open, pump until close.
    async fn run_connection(&mut self) -> Phase {
        self.manual_close = false;
        self.set_state(ChannelState::Connecting);

        let attempt = self.policy.session_attempts();
        let is_reconnect = self.opens > 0 || attempt > 0;
        let url = self.config.url.clone();
        let connect_timeout = self.config.connect_timeout;
        info!(%url, attempt, "connecting");

        let connected = tokio::select! {
            result = Connection::open(&url, connect_timeout) => result,
            // Dropping the open future aborts the in-flight attempt.
            exit = self.commands_while_connecting() => return exit,
        };

        let connection = match connected {
            Ok(connection) => connection,
            Err(e) => {
                warn!("connection attempt failed: {e}");
                self.metrics.record_error();
                self.handler.on_error(e.kind(), &e.to_string()).await;
                return self.finish_close(CloseReason::ConnectFailed).await;
            }
        };

        self.metrics.record_connection();
        if is_reconnect {
            self.metrics.record_reconnection();
        }
        self.policy.record_open();
        self.opens += 1;
        self.set_state(ChannelState::Open);
        info!(attempt, is_reconnect, "channel open");

        let (mut sink, mut source) = connection.into_halves();

        // Replay every desired subscription before the application hears
        // about the open. Server-side subscribes are idempotent.
        for envelope in self.registry.replay() {
            if let Err(e) = sink.send(&envelope).await {
                warn!("subscription replay failed: {e}");
                self.metrics.record_error();
                self.handler.on_error(e.kind(), &e.to_string()).await;
                return self.finish_close(CloseReason::Transport).await;
            }
            self.metrics.record_message_sent();
            self.metrics.record_subscribe_replayed();
        }

        let session = SessionInfo {
            subscription_count: self.registry.len(),
            is_reconnect,
            reconnect_attempt: attempt,
        };
        self.handler.on_open(&session).await;

        let reason = self.pump(&mut sink, &mut source).await;
        self.finish_close(reason).await
    }

    /// Service the command queue while a connection attempt is in flight.
    /// Only returns when the attempt must be abandoned.
    async fn commands_while_connecting(&mut self) -> Phase {
        loop {
            match self.command_rx.recv().await {
                Some(Command::Subscribe(channel)) => {
                    // Deferred: replayed once the pending open completes.
                    self.registry.subscribe(&channel);
                }
                Some(Command::Unsubscribe(channel)) => {
                    self.registry.unsubscribe(&channel);
                }
                Some(Command::Send(_)) => {
                    debug!("send dropped while connecting");
                    self.metrics.record_dropped_send();
                }
                Some(Command::Reconnect) => debug!("already connecting"),
                Some(Command::Disconnect) => {
                    self.manual_close = true;
                    return self.finish_close(CloseReason::ManualClose).await;
                }
                None => {
                    self.rx_closed = true;
                    self.manual_close = true;
                    return Phase::Done;
                }
            }
        }
    }

    /// Drive an open connection until it closes. The liveness timer lives
    /// exactly as long as this scope.
    async fn pump(&mut self, sink: &mut FrameSink, source: &mut FrameSource) -> CloseReason {
        let ping_interval = self.config.ping_interval;
        let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut liveness = LivenessTracker::new();

        loop {
            tokio::select! {
                inbound = source.next() => match inbound {
                    Inbound::Envelope(envelope) => {
                        self.metrics.record_message_received();
                        match envelope {
                            Envelope::Pong { .. } => {
                                // Liveness ack; never surfaced to the application.
                                liveness.record_pong_received();
                                self.metrics.record_pong();
                                trace!("pong received");
                            }
                            Envelope::Ping { timestamp } => {
                                // Answer envelope-level pings the way the hub would.
                                if let Err(e) = sink.send(&Envelope::pong(Some(timestamp))).await {
                                    warn!("failed to answer ping: {e}");
                                    self.metrics.record_error();
                                    self.handler.on_error(e.kind(), &e.to_string()).await;
                                    return CloseReason::Transport;
                                }
                                self.metrics.record_message_sent();
                            }
                            other => self.handler.on_message(other).await,
                        }
                    }
                    Inbound::Malformed(e) => {
                        // Dropped and reported; never terminates the connection.
                        self.metrics.record_malformed_frame();
                        warn!("malformed inbound frame dropped: {e}");
                        let e = Error::Envelope(e);
                        self.handler.on_error(e.kind(), &e.to_string()).await;
                    }
                    Inbound::TransportPing(payload) => {
                        if let Err(e) = sink.transport_pong(payload).await {
                            warn!("failed to answer transport ping: {e}");
                            return CloseReason::Transport;
                        }
                    }
                    Inbound::Closed(reason) => {
                        info!(%reason, "connection closed");
                        return reason;
                    }
                    Inbound::Lost(e) => {
                        warn!("transport error: {e}");
                        self.metrics.record_error();
                        self.handler.on_error(e.kind(), &e.to_string()).await;
                        return CloseReason::Transport;
                    }
                },
                command = self.command_rx.recv() => match command {
                    Some(Command::Send(envelope)) => {
                        match sink.send(&envelope).await {
                            Ok(()) => self.metrics.record_message_sent(),
                            Err(e) => {
                                warn!("send failed: {e}");
                                self.metrics.record_error();
                                self.handler.on_error(e.kind(), &e.to_string()).await;
                                return CloseReason::Transport;
                            }
                        }
                    }
                    Some(Command::Subscribe(channel)) => {
                        if self.registry.subscribe(&channel) {
                            if let Err(e) = sink.send(&Envelope::subscribe(channel)).await {
                                warn!("subscribe send failed: {e}");
                                self.metrics.record_error();
                                self.handler.on_error(e.kind(), &e.to_string()).await;
                                return CloseReason::Transport;
                            }
                            self.metrics.record_message_sent();
                        } else {
                            debug!(%channel, "already subscribed");
                        }
                    }
                    Some(Command::Unsubscribe(channel)) => {
                        if self.registry.unsubscribe(&channel) {
                            if let Err(e) = sink.send(&Envelope::unsubscribe(channel)).await {
                                warn!("unsubscribe send failed: {e}");
                                self.metrics.record_error();
                                self.handler.on_error(e.kind(), &e.to_string()).await;
                                return CloseReason::Transport;
                            }
                            self.metrics.record_message_sent();
                        } else {
                            debug!(%channel, "not subscribed");
                        }
                    }
                    Some(Command::Reconnect) => debug!("reconnect ignored while connected"),
                    Some(Command::Disconnect) => {
                        // Flag first: the close handling below must see a
                        // deliberate close, never a loss.
                        self.manual_close = true;
                        self.set_state(ChannelState::Closing);
                        sink.close().await;
                        return CloseReason::ManualClose;
                    }
                    None => {
                        self.rx_closed = true;
                        self.manual_close = true;
                        sink.close().await;
                        return CloseReason::ManualClose;
                    }
                },
                _ = ping.tick() => {
                    let envelope = Envelope::ping();
                    if let Err(e) = sink.send(&envelope).await {
                        warn!("liveness ping failed: {e}");
                        self.metrics.record_error();
                        self.handler.on_error(e.kind(), &e.to_string()).await;
                        return CloseReason::Transport;
                    }
                    liveness.record_ping_sent();
                    self.metrics.record_ping();
                    // Advisory only: log staleness, never force-close.
                    if liveness.is_stale(ping_interval * 2) {
                        warn!(age = ?liveness.last_pong_age(), "no pong received recently");
                    }
                }
            }
        }
    }

    /// Shared close handling: notify, then let the policy pick what's next.
    async fn finish_close(&mut self, reason: CloseReason) -> Phase {
        self.metrics.record_disconnection();
        self.set_state(ChannelState::Disconnected);
        self.handler.on_close(&reason).await;

        if self.rx_closed {
            return Phase::Done;
        }

        match self.policy.decide(self.manual_close) {
            ReconnectDecision::ManualClose => Phase::Idle,
            ReconnectDecision::Retry { delay, attempt } => {
                info!(?delay, attempt, "scheduling reconnection");
                Phase::Backoff(delay)
            }
            ReconnectDecision::SessionExhausted => {
                let e = Error::SessionExhausted {
                    attempts: self.policy.session_attempts(),
                };
                warn!("{e}");
                self.metrics.record_error();
                self.handler.on_error(e.kind(), &e.to_string()).await;
                Phase::Idle
            }
            ReconnectDecision::LifetimeExhausted => {
                let e = Error::LifetimeExhausted {
                    attempts: self.policy.lifetime_attempts(),
                };
                error!("{e}; channel client is permanently offline");
                self.metrics.record_error();
                self.handler.on_error(e.kind(), &e.to_string()).await;
                Phase::Done
            }
        }
    }

    /// Wait out a backoff delay. At most one pending reconnection exists;
    /// a manual reconnect or disconnect supersedes it.
    async fn run_backoff(&mut self, delay: Duration) -> Phase {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Phase::Connect,
                command = self.command_rx.recv() => match command {
                    Some(Command::Subscribe(channel)) => {
                        self.registry.subscribe(&channel);
                    }
                    Some(Command::Unsubscribe(channel)) => {
                        self.registry.unsubscribe(&channel);
                    }
                    Some(Command::Send(_)) => {
                        debug!("send dropped while reconnecting");
                        self.metrics.record_dropped_send();
                    }
                    Some(Command::Reconnect) => return Phase::Connect,
                    Some(Command::Disconnect) => {
                        // Cancels the pending reconnection; nothing replaces it.
                        self.manual_close = true;
                        return Phase::Idle;
                    }
                    None => {
                        self.rx_closed = true;
                        return Phase::Done;
                    }
                }
            }
        }
    }

    /// Disconnected with no pending attempt: wait for the application.
    async fn run_idle(&mut self) -> Phase {
        loop {
            match self.command_rx.recv().await {
                Some(Command::Reconnect) => return Phase::Connect,
                Some(Command::Subscribe(channel)) => {
                    self.registry.subscribe(&channel);
                }
                Some(Command::Unsubscribe(channel)) => {
                    self.registry.unsubscribe(&channel);
                }
                Some(Command::Send(_)) => {
                    warn!("send dropped while disconnected");
                    self.metrics.record_dropped_send();
                    if !self.manual_close {
                        if let ReconnectDecision::Retry { delay, attempt } =
                            self.policy.decide(false)
                        {
                            info!(?delay, attempt, "send while disconnected; scheduling reconnection");
                            return Phase::Backoff(delay);
                        }
                    }
                }
                Some(Command::Disconnect) => {
                    debug!("already disconnected");
                    self.manual_close = true;
                }
                None => return Phase::Done,
            }
        }
    }
}
