//! Events published on the vehicle bus and inbound frame routing.
//!
//! Every decoded frame is published twice: once as a generic
//! [`Event::Message`] carrying the raw JSON, then, when its `type` is
//! recognised, as a typed [`Event::Feed`]. Lifecycle events from the
//! connection manager share the same bus.

use std::fmt;

use bustrack_types::{FeedMessage, FrameError, decode_frame};
use serde_json::Value;
use tracing::debug;

use crate::dispatcher::{Dispatch, EventDispatcher};

/// Close code for a connection that dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a deliberate, clean shutdown.
pub const CLOSE_NORMAL: u16 = 1000;

/// Subscription key for [`Event`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The channel opened.
    Connected,
    /// The channel closed, deliberately or not.
    Disconnected,
    /// A transport-level error occurred.
    Error,
    /// Any decoded frame, before typed routing.
    Message,
    /// `initial_data` full snapshot.
    InitialData,
    /// `buses_update` full snapshot.
    BusesUpdate,
    /// `location_update` incremental patch.
    LocationUpdate,
    /// `route_buses_update` full snapshot.
    RouteBusesUpdate,
}

impl EventKind {
    /// The four kinds that carry a [`FeedMessage`].
    pub const FEED: [Self; 4] = [
        Self::InitialData,
        Self::BusesUpdate,
        Self::LocationUpdate,
        Self::RouteBusesUpdate,
    ];

    /// Wire-style name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Message => "message",
            Self::InitialData => "initial_data",
            Self::BusesUpdate => "buses_update",
            Self::LocationUpdate => "location_update",
            Self::RouteBusesUpdate => "route_buses_update",
        }
    }

    /// The kind a typed feed message is published under.
    pub const fn of(message: &FeedMessage) -> Self {
        match message {
            FeedMessage::InitialData { .. } => Self::InitialData,
            FeedMessage::BusesUpdate { .. } => Self::BusesUpdate,
            FeedMessage::LocationUpdate { .. } => Self::LocationUpdate,
            FeedMessage::RouteBusesUpdate { .. } => Self::RouteBusesUpdate,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a channel closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
    /// Close reason text; empty when none was given.
    pub reason: String,
}

impl CloseInfo {
    /// A close without a close frame (dropped socket, failed open).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: Some(CLOSE_ABNORMAL),
            reason: reason.into(),
        }
    }

    /// A deliberate close initiated by this side.
    pub fn normal() -> Self {
        Self {
            code: Some(CLOSE_NORMAL),
            reason: String::new(),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) if self.reason.is_empty() => write!(f, "code {code}"),
            Some(code) => write!(f, "code {code}: {}", self.reason),
            None => f.write_str("no close code"),
        }
    }
}

/// Everything published on the vehicle bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The channel opened.
    Connected {
        /// Address the channel is connected to.
        address: String,
    },
    /// The channel closed.
    Disconnected(CloseInfo),
    /// A transport-level error; does not by itself close the channel.
    Error(String),
    /// A decoded frame as raw JSON.
    Message(Value),
    /// A recognised, typed frame.
    Feed(FeedMessage),
}

impl Dispatch for Event {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected(_) => EventKind::Disconnected,
            Self::Error(_) => EventKind::Error,
            Self::Message(_) => EventKind::Message,
            Self::Feed(message) => EventKind::of(message),
        }
    }
}

/// The dispatcher shared by the connection manager and its consumers.
pub type EventBus = EventDispatcher<Event>;

/// Decode one inbound text frame and publish it.
///
/// The generic [`EventKind::Message`] publish always comes first; the typed
/// publish follows only for recognised kinds. A frame that fails to decode
/// publishes nothing.
pub fn dispatch_frame(bus: &EventBus, text: &str) -> Result<(), FrameError> {
    let frame = decode_frame(text)?;
    bus.publish(&Event::Message(frame.raw));
    match (frame.message, frame.kind) {
        (Some(message), _) => {
            bus.publish(&Event::Feed(message));
        }
        (None, Some(kind)) => debug!(kind = %kind, "frame kind has no typed route"),
        (None, None) => debug!("frame carries no type tag"),
    }
    Ok(())
}
