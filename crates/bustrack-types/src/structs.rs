//! Entity structs exchanged with the feed and the REST collaborator.
//!
//! Covers `Location`, `Vehicle` (with its denormalized `RouteSummary`),
//! `Route`, `Stop`, and the smaller request/response shapes used by the
//! location endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{LocationId, RouteId, StopId, VehicleId};
use crate::lenient::{f64_from_any, opt_f64_from_any};

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A single position fix for a vehicle.
///
/// Locations are immutable values. A newer fix always replaces the previous
/// one wholesale; fields are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Location {
    /// Server-side key of the fix, when it was persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LocationId>,
    /// Latitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub longitude: f64,
    /// Ground speed in km/h.
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub speed: Option<f64>,
    /// Heading in degrees (0 to 360).
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub heading: Option<f64>,
    /// GPS accuracy radius in meters.
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub accuracy: Option<f64>,
    /// When the fix was taken. Required for recency classification.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Location {
    /// Create a bare fix at the given coordinates.
    pub const fn at(latitude: f64, longitude: f64, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            id: None,
            latitude,
            longitude,
            speed: None,
            heading: None,
            accuracy: None,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

/// Denormalized route information embedded in a vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RouteSummary {
    /// Route key. The tracking shape may omit it.
    #[serde(default)]
    pub id: Option<RouteId>,
    /// Public route number, e.g. `"101"`.
    #[serde(rename = "route_number", default)]
    pub number: String,
    /// Human-readable route name.
    #[serde(default)]
    pub name: String,
    /// Display colour as a CSS hex string.
    #[serde(default)]
    pub color: Option<String>,
}

/// A bus as known to the roster.
///
/// Full snapshots create and replace vehicles; incremental patches only ever
/// touch `current_location`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(from = "WireVehicle")]
#[ts(export, export_to = "bindings/")]
pub struct Vehicle {
    /// Stable roster key.
    pub id: VehicleId,
    /// Fleet number painted on the bus.
    #[serde(rename = "bus_number")]
    pub number: String,
    /// Registration plate.
    pub license_plate: String,
    /// Seated plus standing capacity.
    pub capacity: Option<u32>,
    /// Assigned driver, if any.
    pub driver_name: Option<String>,
    /// Route the bus is running on.
    pub route: Option<RouteSummary>,
    /// Latest known position.
    pub current_location: Option<Location>,
}

/// Every shape a vehicle arrives in: the full REST shape with a nested
/// `route`, and the compact tracking shape with flat `route_*` fields.
#[derive(Deserialize)]
struct WireVehicle {
    id: VehicleId,
    #[serde(default)]
    bus_number: String,
    #[serde(default)]
    license_plate: String,
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    driver_name: Option<String>,
    #[serde(default)]
    route: Option<RouteSummary>,
    #[serde(default)]
    route_id: Option<RouteId>,
    #[serde(default)]
    route_number: Option<String>,
    #[serde(default)]
    route_name: Option<String>,
    #[serde(default)]
    route_color: Option<String>,
    #[serde(default)]
    current_location: Option<Location>,
}

impl From<WireVehicle> for Vehicle {
    fn from(wire: WireVehicle) -> Self {
        let route = match wire.route {
            Some(mut nested) => {
                if nested.id.is_none() {
                    nested.id = wire.route_id;
                }
                Some(nested)
            }
            None if wire.route_id.is_some()
                || wire.route_number.is_some()
                || wire.route_color.is_some() =>
            {
                Some(RouteSummary {
                    id: wire.route_id,
                    number: wire.route_number.unwrap_or_default(),
                    name: wire.route_name.unwrap_or_default(),
                    color: wire.route_color,
                })
            }
            None => None,
        };

        Self {
            id: wire.id,
            number: wire.bus_number,
            license_plate: wire.license_plate,
            capacity: wire.capacity,
            driver_name: wire.driver_name.filter(|name| !name.trim().is_empty()),
            route,
            current_location: wire.current_location,
        }
    }
}

impl Vehicle {
    /// Key of the route this vehicle runs on, if known.
    pub fn route_id(&self) -> Option<RouteId> {
        self.route.as_ref().and_then(|route| route.id)
    }

    /// Timestamp of the latest fix, if any.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.current_location.as_ref().and_then(|loc| loc.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Route & Stop
// ---------------------------------------------------------------------------

/// A stop along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Stop {
    /// Stop key.
    pub id: StopId,
    /// Display name.
    #[serde(rename = "stop_name")]
    pub name: String,
    /// Position of the stop in the route's sequence (1-based).
    pub stop_order: u32,
    /// Latitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub longitude: f64,
    /// Scheduled arrival time of day (`HH:MM:SS`), when published.
    #[serde(default)]
    pub estimated_time: Option<String>,
}

/// A bus route with its stops. Supplied by the REST collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Route {
    /// Route key.
    pub id: RouteId,
    /// Public route number.
    #[serde(rename = "route_number")]
    pub number: String,
    /// Human-readable route name.
    pub name: String,
    /// Longer description shown in selectors.
    #[serde(default)]
    pub description: String,
    /// Display colour as a CSS hex string.
    #[serde(default)]
    pub color: String,
    /// Stops in whatever order the server returned them.
    #[serde(default)]
    pub stops: Vec<Stop>,
    /// Number of active buses on the route.
    #[serde(default)]
    pub buses_count: u32,
}

impl Route {
    /// Stops sorted by `stop_order`, which defines the drawing sequence.
    pub fn ordered_stops(&self) -> Vec<&Stop> {
        let mut stops: Vec<&Stop> = self.stops.iter().collect();
        stops.sort_by_key(|stop| stop.stop_order);
        stops
    }

    /// Summary suitable for embedding in a [`Vehicle`].
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            id: Some(self.id),
            number: self.number.clone(),
            name: self.name.clone(),
            color: Some(self.color.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Location endpoints
// ---------------------------------------------------------------------------

/// Body of a location report posted for a single bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LocationReport {
    /// Latitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(deserialize_with = "f64_from_any")]
    pub longitude: f64,
    /// Ground speed in km/h.
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub speed: Option<f64>,
    /// Heading in degrees.
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub heading: Option<f64>,
    /// GPS accuracy in meters.
    #[serde(default, deserialize_with = "opt_f64_from_any")]
    pub accuracy: Option<f64>,
}

impl LocationReport {
    /// Stamp the report into a [`Location`] fix.
    pub const fn into_location(self, id: Option<LocationId>, timestamp: DateTime<Utc>) -> Location {
        Location {
            id,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            heading: self.heading,
            accuracy: self.accuracy,
            timestamp: Some(timestamp),
        }
    }
}

/// Identity of the bus a latest-location entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BusInfo {
    /// Bus key.
    pub id: VehicleId,
    /// Fleet number.
    pub bus_number: String,
    /// Route number the bus is running.
    pub route_number: String,
    /// Route display colour.
    pub route_color: String,
}

/// Latest fix of one active bus, as returned by the latest-locations
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LatestLocation {
    /// The fix itself.
    #[serde(flatten)]
    pub location: Location,
    /// The bus it belongs to.
    pub bus_info: BusInfo,
}
