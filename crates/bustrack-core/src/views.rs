//! Read views over the shared roster: the bus list and the live map.
//!
//! Views hold only presentation state (route filter, selection). Vehicle
//! data always comes from a [`Roster`] snapshot passed in at read time.

use bustrack_types::{Route, RouteId, Vehicle, VehicleId};
use chrono::{DateTime, Utc};

use crate::reconciler::Roster;
use crate::recency::{Recency, format_age};

/// Colour used when a vehicle's route has none.
pub const DEFAULT_ROUTE_COLOR: &str = "#0066cc";

/// Shown when a bus has no driver assigned.
pub const NO_DRIVER: &str = "Not assigned";

fn route_color(vehicle: &Vehicle) -> String {
    vehicle
        .route
        .as_ref()
        .and_then(|route| route.color.clone())
        .filter(|color| !color.is_empty())
        .unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_owned())
}

fn filtered<'a>(
    roster: &'a Roster,
    route: Option<RouteId>,
) -> Box<dyn Iterator<Item = &'a Vehicle> + 'a> {
    match route {
        Some(id) => Box::new(roster.on_route(id)),
        None => Box::new(roster.vehicles()),
    }
}

// ---------------------------------------------------------------------------
// List view
// ---------------------------------------------------------------------------

/// One line of the bus list, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    /// Vehicle id.
    pub id: VehicleId,
    /// Fleet number.
    pub bus_number: String,
    /// Registration plate.
    pub license_plate: String,
    /// Capacity, when known.
    pub capacity: Option<u32>,
    /// Route number, when the vehicle has a route.
    pub route_number: Option<String>,
    /// Route swatch colour.
    pub route_color: String,
    /// Driver name or [`NO_DRIVER`].
    pub driver: String,
    /// Speed text, e.g. `"32.5 km/h"`; `"0 km/h"` without a reading.
    pub speed: String,
    /// Recency tier of the last fix.
    pub recency: Recency,
    /// Relative age of the last fix, e.g. `"3m ago"`.
    pub last_update: String,
    /// `"lat, lon"` to four decimals.
    pub position: Option<String>,
    /// Heading in whole degrees.
    pub heading: Option<String>,
    /// Accuracy radius to one decimal.
    pub accuracy: Option<String>,
}

/// The bus list, optionally restricted to one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListView {
    /// Only show buses on this route.
    pub route: Option<RouteId>,
}

impl ListView {
    /// A list restricted to `route`, or showing every bus.
    pub const fn new(route: Option<RouteId>) -> Self {
        Self { route }
    }

    /// Render rows for the vehicles in `roster` as of `now`.
    pub fn rows(&self, roster: &Roster, now: DateTime<Utc>) -> Vec<ListRow> {
        filtered(roster, self.route)
            .map(|vehicle| Self::row(vehicle, now))
            .collect()
    }

    fn row(vehicle: &Vehicle, now: DateTime<Utc>) -> ListRow {
        let location = vehicle.current_location.as_ref();
        let timestamp = vehicle.last_seen();

        ListRow {
            id: vehicle.id,
            bus_number: vehicle.number.clone(),
            license_plate: vehicle.license_plate.clone(),
            capacity: vehicle.capacity,
            route_number: vehicle.route.as_ref().map(|route| route.number.clone()),
            route_color: route_color(vehicle),
            driver: vehicle
                .driver_name
                .clone()
                .unwrap_or_else(|| NO_DRIVER.to_owned()),
            speed: location
                .and_then(|loc| loc.speed)
                .map_or_else(|| "0 km/h".to_owned(), |speed| format!("{speed:.1} km/h")),
            recency: Recency::classify(timestamp, now),
            last_update: format_age(timestamp, now),
            position: location.map(|loc| format!("{:.4}, {:.4}", loc.latitude, loc.longitude)),
            heading: location
                .and_then(|loc| loc.heading)
                .map(|heading| format!("{heading:.0}°")),
            accuracy: location
                .and_then(|loc| loc.accuracy)
                .map(|accuracy| format!("{accuracy:.1}m")),
        }
    }
}

// ---------------------------------------------------------------------------
// Map view
// ---------------------------------------------------------------------------

/// A vehicle pin on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    /// Vehicle id.
    pub id: VehicleId,
    /// Fleet number shown on the pin.
    pub label: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Heading, for rotating the pin.
    pub heading: Option<f64>,
    /// Pin colour, from the route.
    pub color: String,
    /// Whether this pin is highlighted.
    pub selected: bool,
    /// Recency tier of the fix.
    pub recency: Recency,
}

/// Smallest box containing every marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Southern edge (min latitude).
    pub south: f64,
    /// Western edge (min longitude).
    pub west: f64,
    /// Northern edge (max latitude).
    pub north: f64,
    /// Eastern edge (max longitude).
    pub east: f64,
}

impl Bounds {
    fn around(latitude: f64, longitude: f64) -> Self {
        Self {
            south: latitude,
            west: longitude,
            north: latitude,
            east: longitude,
        }
    }

    fn extend(self, latitude: f64, longitude: f64) -> Self {
        Self {
            south: self.south.min(latitude),
            west: self.west.min(longitude),
            north: self.north.max(latitude),
            east: self.east.max(longitude),
        }
    }
}

/// A route drawn as a polyline through its stops.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePath {
    /// Route id.
    pub route: RouteId,
    /// Line colour.
    pub color: String,
    /// `(lat, lon)` points in stop order.
    pub points: Vec<(f64, f64)>,
    /// Drawn solid when the route is the active filter, dashed otherwise.
    pub emphasized: bool,
}

/// The live map, with an optional route filter and a selected vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapView {
    /// Only show buses and paths for this route.
    pub route: Option<RouteId>,
    /// Highlighted vehicle.
    pub selected: Option<VehicleId>,
}

impl MapView {
    /// A map restricted to `route`, or showing everything.
    pub const fn new(route: Option<RouteId>) -> Self {
        Self {
            route,
            selected: None,
        }
    }

    /// Select `id`, or clear the selection if it is already selected.
    pub fn toggle_selection(&mut self, id: VehicleId) {
        self.selected = if self.selected == Some(id) {
            None
        } else {
            Some(id)
        };
    }

    /// Pins for every vehicle with a known position.
    pub fn markers(&self, roster: &Roster, now: DateTime<Utc>) -> Vec<Marker> {
        filtered(roster, self.route)
            .filter_map(|vehicle| {
                let location = vehicle.current_location.as_ref()?;
                Some(Marker {
                    id: vehicle.id,
                    label: vehicle.number.clone(),
                    latitude: location.latitude,
                    longitude: location.longitude,
                    heading: location.heading,
                    color: route_color(vehicle),
                    selected: self.selected == Some(vehicle.id),
                    recency: Recency::classify(location.timestamp, now),
                })
            })
            .collect()
    }

    /// Box to fit the map to, or `None` when no vehicle has a position.
    pub fn bounds(&self, roster: &Roster) -> Option<Bounds> {
        filtered(roster, self.route)
            .filter_map(|vehicle| vehicle.current_location.as_ref())
            .fold(None::<Bounds>, |bounds, loc| {
                Some(bounds.map_or_else(
                    || Bounds::around(loc.latitude, loc.longitude),
                    |b| b.extend(loc.latitude, loc.longitude),
                ))
            })
    }

    /// Polylines for `routes`, each through its stops in `stop_order`.
    ///
    /// With a route filter only that route is drawn. Routes without stops
    /// are skipped.
    pub fn route_paths(&self, routes: &[Route]) -> Vec<RoutePath> {
        routes
            .iter()
            .filter(|route| self.route.is_none_or(|id| id == route.id))
            .filter(|route| !route.stops.is_empty())
            .map(|route| RoutePath {
                route: route.id,
                color: if route.color.is_empty() {
                    DEFAULT_ROUTE_COLOR.to_owned()
                } else {
                    route.color.clone()
                },
                points: route
                    .ordered_stops()
                    .into_iter()
                    .map(|stop| (stop.latitude, stop.longitude))
                    .collect(),
                emphasized: self.route == Some(route.id),
            })
            .collect()
    }
}
