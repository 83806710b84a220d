//! The connection manager: one live channel, kept alive across failures.
//!
//! [`ConnectionManager`] owns the channel, its lifecycle state machine, and
//! the reconnection policy. Inbound frames are decoded and published on the
//! shared [`EventBus`]; consumers never touch the socket.
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//! Connected --unexpected close, attempts <  max--> Reconnecting --delay--> Connecting
//! Connecting/Connected --unexpected close, attempts >= max--> Disconnected
//! any --disconnect()--> Disconnected (no retry)
//! ```
//!
//! Every session carries a generation number. `connect` and `disconnect`
//! bump it, and a session whose generation is stale stops without touching
//! state or publishing, so a pending retry timer becomes a no-op.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bustrack_core::{CloseInfo, ConnectionConfig, Event, EventBus, dispatch_frame};
use bustrack_types::{ClientMessage, RouteId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::transport::{Channel, ChannelEvent, Transport};
use crate::error::TransportError;

/// Lifecycle state of the managed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No channel and no retry pending.
    Disconnected,
    /// Opening a channel.
    Connecting,
    /// Channel open; `send` is accepted.
    Connected,
    /// Waiting out the delay before the next attempt.
    Reconnecting,
}

/// Fixed-delay, attempt-bounded reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait before each attempt.
    pub delay: Duration,
    /// Attempts allowed before staying disconnected.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Policy from the `connection` config section.
    pub const fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.reconnect_delay_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// Address of the route-scoped channel next to a fleet-wide one.
///
/// `ws://host/ws/buses/` becomes `ws://host/ws/route/3/`.
pub fn route_address(fleet_address: &str, route: RouteId) -> String {
    let base = fleet_address.trim_end_matches('/');
    let base = base.strip_suffix("/ws/buses").unwrap_or(base);
    format!("{base}/ws/route/{route}/")
}

enum Command {
    Send(String),
    Close,
}

struct Inner {
    policy: ReconnectPolicy,
    bus: Arc<EventBus>,
    transport: Arc<dyn Transport>,
    state: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    generation: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn bump_generation(&self) -> u64 {
        self.generation
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the live channel.
///
/// Cheap to clone; clones share one channel. Constructed once by the
/// composition root and handed to whoever needs to send.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// A disconnected manager publishing on `bus`.
    pub fn new(policy: ReconnectPolicy, bus: Arc<EventBus>, transport: Arc<dyn Transport>) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                policy,
                bus,
                transport,
                state,
                attempts: AtomicU32::new(0),
                generation: AtomicU64::new(0),
                outbound: Mutex::new(None),
                session: Mutex::new(None),
            }),
        }
    }

    /// Open a channel to `address`.
    ///
    /// Ignored while already connecting or connected. From `Disconnected` or
    /// `Reconnecting` it cancels any pending retry and starts a fresh
    /// attempt. The attempt counter is only reset by a successful open.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self, address: impl Into<String>) {
        let state = self.inner.current_state();
        if matches!(
            state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(?state, "connect ignored");
            return;
        }

        let address = address.into();
        let generation = self.inner.bump_generation();
        if let Some(previous) = lock(&self.inner.session).take() {
            previous.abort();
        }
        self.inner.state.send_replace(ConnectionState::Connecting);
        info!(address = %address, "connecting");

        let handle = tokio::spawn(run_session(Arc::clone(&self.inner), address, generation));
        *lock(&self.inner.session) = Some(handle);
    }

    /// Close the channel deliberately. No reconnection is scheduled.
    pub fn disconnect(&self) {
        self.inner.bump_generation();
        let outbound = lock(&self.inner.outbound).take();
        let session = lock(&self.inner.session).take();
        match (outbound, session) {
            // An open channel gets a clean close; its task exits after it.
            (Some(tx), _) if tx.send(Command::Close).is_ok() => {}
            (_, Some(handle)) => handle.abort(),
            (_, None) => {}
        }

        let previous = self.inner.state.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!(?previous, "disconnected by request");
            self.inner
                .bus
                .publish(&Event::Disconnected(CloseInfo::normal()));
        }
    }

    /// Send a request frame.
    ///
    /// Only sent while connected. Otherwise a warning is logged and the
    /// message is discarded; nothing is queued or retried.
    ///
    /// Returns whether the frame was handed to the channel.
    pub fn send(&self, message: ClientMessage) -> bool {
        if !self.is_connected() {
            warn!(?message, "not connected; dropping outbound message");
            return false;
        }
        match message.to_frame() {
            Ok(frame) => self.send_text(frame),
            Err(e) => {
                error!(?message, error = %e, "failed to encode outbound message");
                false
            }
        }
    }

    /// Send raw text with the same rules as [`Self::send`].
    pub fn send_text(&self, text: String) -> bool {
        if !self.is_connected() {
            warn!("not connected; dropping outbound frame");
            return false;
        }
        lock(&self.inner.outbound)
            .as_ref()
            .is_some_and(|tx| tx.send(Command::Send(text)).is_ok())
    }

    /// Ask the fleet-wide channel for a fresh snapshot.
    pub fn request_snapshot(&self) -> bool {
        self.send(ClientMessage::GetBuses)
    }

    /// Ask a route-scoped channel for a fresh snapshot.
    pub fn request_route_snapshot(&self) -> bool {
        self.send(ClientMessage::GetRouteBuses)
    }

    /// Whether the channel is open.
    pub fn is_connected(&self) -> bool {
        self.inner.current_state() == ConnectionState::Connected
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.current_state()
    }

    /// Reconnection attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// A receiver that wakes on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// The bus this manager publishes on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.inner.bus
    }

    /// The reconnection policy in force.
    pub fn policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.inner.current_state())
            .field("attempts", &self.reconnect_attempts())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

/// Drive one session: open, pump, and retry until told to stop or out of
/// attempts.
async fn run_session(inner: Arc<Inner>, address: String, generation: u64) {
    loop {
        let close = match inner.transport.open(&address).await {
            Ok(mut channel) => {
                let (tx, rx) = mpsc::unbounded_channel();
                // `disconnect` bumps the generation before it takes the
                // outbound lock, so it either sees this sender or we see
                // the new generation.
                let opened = {
                    let mut outbound = lock(&inner.outbound);
                    let current = inner.is_current(generation);
                    if current {
                        *outbound = Some(tx);
                        inner.attempts.store(0, Ordering::SeqCst);
                        inner.state.send_replace(ConnectionState::Connected);
                    }
                    current
                };
                if !opened {
                    debug!(address = %address, "discarding channel opened after cancel");
                    if let Err(e) = channel.close().await {
                        debug!(error = %e, "close handshake failed");
                    }
                    return;
                }
                info!(address = %address, "channel open");
                inner.bus.publish(&Event::Connected {
                    address: address.clone(),
                });

                let close = pump(&inner, channel, rx, generation).await;
                if inner.is_current(generation) {
                    lock(&inner.outbound).take();
                }
                match close {
                    Some(info) => info,
                    None => return,
                }
            }
            Err(e) => {
                if !inner.is_current(generation) {
                    return;
                }
                error!(address = %address, error = %e, "failed to open channel");
                inner.bus.publish(&Event::Error(e.to_string()));
                CloseInfo::abnormal(e.to_string())
            }
        };

        if !inner.is_current(generation) {
            return;
        }
        let attempts = inner.attempts.load(Ordering::SeqCst);
        let exhausted = attempts >= inner.policy.max_attempts;
        inner.state.send_replace(if exhausted {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Reconnecting
        });
        info!(address = %address, close = %close, "channel closed");
        inner.bus.publish(&Event::Disconnected(close));

        if exhausted {
            warn!(
                attempts,
                "reconnect attempts exhausted; staying disconnected until connect is called"
            );
            return;
        }

        tokio::time::sleep(inner.policy.delay).await;
        if !inner.is_current(generation)
            || inner.current_state() != ConnectionState::Reconnecting
        {
            return;
        }
        let attempt = attempts.saturating_add(1);
        inner.attempts.store(attempt, Ordering::SeqCst);
        info!(attempt, max = inner.policy.max_attempts, "reconnecting");
        inner.state.send_replace(ConnectionState::Connecting);
    }
}

enum Step {
    Inbound(Result<ChannelEvent, TransportError>),
    Outbound(Option<Command>),
}

/// Shuttle frames until the channel closes (`Some`) or a deliberate close
/// is requested (`None`).
async fn pump(
    inner: &Inner,
    mut channel: Box<dyn Channel>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    generation: u64,
) -> Option<CloseInfo> {
    loop {
        let step = tokio::select! {
            event = channel.next_event() => Step::Inbound(event),
            command = rx.recv() => Step::Outbound(command),
        };

        match step {
            Step::Inbound(Ok(ChannelEvent::Text(text))) => {
                if !inner.is_current(generation) {
                    return None;
                }
                if let Err(e) = dispatch_frame(&inner.bus, &text) {
                    error!(error = %e, "dropping malformed frame");
                }
            }
            Step::Inbound(Ok(ChannelEvent::Closed(info))) => return Some(info),
            Step::Inbound(Err(e)) => {
                if !inner.is_current(generation) {
                    return None;
                }
                error!(error = %e, "channel error");
                inner.bus.publish(&Event::Error(e.to_string()));
            }
            Step::Outbound(Some(Command::Send(text))) => {
                if let Err(e) = channel.send_text(text).await {
                    error!(error = %e, "failed to send frame");
                    inner.bus.publish(&Event::Error(e.to_string()));
                }
            }
            Step::Outbound(Some(Command::Close) | None) => {
                if let Err(e) = channel.close().await {
                    debug!(error = %e, "close handshake failed");
                }
                return None;
            }
        }
    }
}
