//! Wire messages exchanged over the live vehicle channel.
//!
//! Inbound frames are JSON objects tagged by a `type` field. The recognised
//! kinds form the closed [`FeedMessage`] union; frames with any other `type`
//! still decode into a [`DecodedFrame`] so they can be delivered to generic
//! listeners.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::ids::{RouteId, VehicleId};
use crate::structs::{Location, Vehicle};

/// A recognised inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FeedMessage {
    /// Full snapshot sent by the server when a channel opens.
    InitialData {
        /// Every active vehicle visible on this channel.
        buses: Vec<Vehicle>,
        /// Set when the channel is scoped to one route.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        route_id: Option<RouteId>,
    },
    /// Full snapshot refresh, usually the answer to `get_buses`.
    BusesUpdate {
        /// Every active vehicle.
        buses: Vec<Vehicle>,
    },
    /// Incremental patch carrying a single vehicle's new position.
    LocationUpdate {
        /// The vehicle that moved.
        bus_id: VehicleId,
        /// Its new position, replacing the previous one wholesale.
        location: Location,
    },
    /// Full snapshot for a route-scoped channel, answer to `get_route_buses`.
    RouteBusesUpdate {
        /// The route the channel is scoped to.
        route_id: RouteId,
        /// Active vehicles on that route.
        buses: Vec<Vehicle>,
    },
}

impl FeedMessage {
    /// Every `type` tag this union understands.
    pub const KINDS: [&'static str; 4] = [
        "initial_data",
        "buses_update",
        "location_update",
        "route_buses_update",
    ];

    /// The wire `type` tag of this message.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InitialData { .. } => "initial_data",
            Self::BusesUpdate { .. } => "buses_update",
            Self::LocationUpdate { .. } => "location_update",
            Self::RouteBusesUpdate { .. } => "route_buses_update",
        }
    }

    /// The vehicle list carried by a full snapshot, or `None` for a patch.
    pub fn snapshot(&self) -> Option<&[Vehicle]> {
        match self {
            Self::InitialData { buses, .. }
            | Self::BusesUpdate { buses }
            | Self::RouteBusesUpdate { buses, .. } => Some(buses),
            Self::LocationUpdate { .. } => None,
        }
    }
}

/// An outbound request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Ask the fleet-wide channel for a fresh `buses_update`.
    GetBuses,
    /// Ask a route-scoped channel for a fresh `route_buses_update`.
    GetRouteBuses,
}

impl ClientMessage {
    /// Serialize into the JSON text sent over the channel.
    pub fn to_frame(self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame is JSON but not an object envelope.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// The frame names a known kind but its payload does not match it.
    #[error("malformed {kind} payload: {source}")]
    InvalidPayload {
        /// The `type` tag the frame carried.
        kind: String,
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

/// An inbound frame after envelope decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// The whole frame as parsed JSON.
    pub raw: Value,
    /// The `type` tag, when the frame carries a string one.
    pub kind: Option<String>,
    /// The typed message, when `kind` is one of [`FeedMessage::KINDS`].
    pub message: Option<FeedMessage>,
}

/// Decode a text frame into its envelope and, when recognised, its typed
/// message.
///
/// A frame whose `type` is unknown is not an error; it decodes with
/// `message == None`. A frame that is not a JSON object, or whose payload
/// does not match its known `type`, is rejected as a whole.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, FrameError> {
    let raw: Value = serde_json::from_str(text).map_err(FrameError::InvalidJson)?;
    let Some(envelope) = raw.as_object() else {
        return Err(FrameError::NotAnObject);
    };
    let kind = envelope
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned);

    let message = match kind.as_deref() {
        Some(tag) if FeedMessage::KINDS.contains(&tag) => Some(
            FeedMessage::deserialize(&raw).map_err(|source| FrameError::InvalidPayload {
                kind: tag.to_owned(),
                source,
            })?,
        ),
        _ => None,
    };

    Ok(DecodedFrame { raw, kind, message })
}
