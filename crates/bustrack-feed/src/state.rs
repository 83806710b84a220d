//! Shared application state for the feed server.
//!
//! [`FeedState`] is held in an [`Arc`] and passed to every Axum handler.
//! It owns the in-memory [`Fleet`] (routes, buses, location history) and a
//! [`broadcast`] channel that fans location updates out to every open
//! `WebSocket` channel.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bustrack_types::{
    BusInfo, LatestLocation, Location, LocationId, LocationReport, Route, RouteId, Stop, Vehicle,
    VehicleId,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

/// Capacity of the location broadcast channel.
///
/// Channels that fall further behind than this skip ahead.
const BROADCAST_CAPACITY: usize = 256;

/// Hours of location history kept. Older fixes are dropped as new ones
/// arrive; each bus's latest fix is kept regardless.
pub const HISTORY_RETENTION_HOURS: u32 = 48;

/// A bus registered with the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusRecord {
    /// Bus key.
    pub id: VehicleId,
    /// Fleet number.
    pub bus_number: String,
    /// Registration plate.
    pub license_plate: String,
    /// Route the bus is assigned to.
    pub route_id: Option<RouteId>,
    /// Passenger capacity.
    pub capacity: u32,
    /// Assigned driver. Empty when unassigned.
    pub driver_name: String,
    /// Inactive buses are hidden from every listing.
    pub active: bool,
}

/// The compact per-bus shape served by the tracking endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedBus {
    /// Bus key.
    pub id: VehicleId,
    /// Fleet number.
    pub bus_number: String,
    /// Route key.
    pub route_id: Option<RouteId>,
    /// Public route number.
    pub route_number: Option<String>,
    /// Route display colour.
    pub route_color: Option<String>,
    /// Latest fix.
    pub current_location: Option<Location>,
}

/// A location fix fanned out to connected channels.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationBroadcast {
    /// The bus that moved.
    pub bus_id: VehicleId,
    /// The route it runs on, used to filter route-scoped channels.
    pub route_id: Option<RouteId>,
    /// The new fix.
    pub location: Location,
}

#[derive(Debug, Clone)]
struct LocationRecord {
    bus_id: VehicleId,
    location: Location,
}

/// In-memory routes, buses, and location history.
///
/// History is kept in arrival order and trimmed to
/// [`HISTORY_RETENTION_HOURS`]. The newest fix per bus is indexed
/// separately so reads never scan the history.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    routes: BTreeMap<RouteId, Route>,
    buses: BTreeMap<VehicleId, BusRecord>,
    history: VecDeque<LocationRecord>,
    latest: BTreeMap<VehicleId, Location>,
    last_location_id: u32,
}

impl Fleet {
    /// Create an empty fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a route. `buses_count` is derived on read.
    pub fn insert_route(&mut self, route: Route) {
        self.routes.insert(route.id, route);
    }

    /// Register or replace a bus.
    pub fn insert_bus(&mut self, bus: BusRecord) {
        self.buses.insert(bus.id, bus);
    }

    /// Store a reported fix for a bus and drop history older than the
    /// retention window measured from `at`.
    ///
    /// Returns the update to broadcast, or `None` if the bus is unknown.
    pub fn record_location(
        &mut self,
        bus_id: VehicleId,
        report: LocationReport,
        at: DateTime<Utc>,
    ) -> Option<LocationBroadcast> {
        let route_id = self.buses.get(&bus_id)?.route_id;
        self.last_location_id = self.last_location_id.saturating_add(1);
        let location = report.into_location(Some(LocationId(self.last_location_id)), at);
        let newer = self
            .latest
            .get(&bus_id)
            .is_none_or(|held| held.timestamp <= location.timestamp);
        if newer {
            self.latest.insert(bus_id, location.clone());
        }
        self.history.push_back(LocationRecord {
            bus_id,
            location: location.clone(),
        });
        self.prune_history(at);
        Some(LocationBroadcast {
            bus_id,
            route_id,
            location,
        })
    }

    /// Drop history records older than [`HISTORY_RETENTION_HOURS`] before
    /// `now`. Returns how many were dropped.
    ///
    /// Records are trimmed from the oldest end and trimming stops at the
    /// first record still inside the window.
    pub fn prune_history(&mut self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = TimeDelta::try_hours(i64::from(HISTORY_RETENTION_HOURS))
            .and_then(|window| now.checked_sub_signed(window))
        else {
            return 0;
        };
        let before = self.history.len();
        while self
            .history
            .front()
            .is_some_and(|record| record.location.timestamp.is_none_or(|ts| ts < cutoff))
        {
            self.history.pop_front();
        }
        before.saturating_sub(self.history.len())
    }

    /// Whether an active bus with this key exists.
    pub fn has_bus(&self, id: VehicleId) -> bool {
        self.active_bus(id).is_some()
    }

    /// Every route, stops ordered and `buses_count` filled in.
    pub fn routes(&self) -> Vec<Route> {
        self.routes.values().map(|route| self.route_view(route)).collect()
    }

    /// A single route.
    pub fn route(&self, id: RouteId) -> Option<Route> {
        self.routes.get(&id).map(|route| self.route_view(route))
    }

    /// The stops of a route in `stop_order`.
    pub fn route_stops(&self, id: RouteId) -> Option<Vec<Stop>> {
        self.route(id).map(|route| route.stops)
    }

    /// Every stop, optionally limited to one route.
    pub fn stops(&self, route: Option<RouteId>) -> Vec<Stop> {
        self.routes
            .values()
            .filter(|r| route.is_none_or(|id| r.id == id))
            .flat_map(|r| r.ordered_stops().into_iter().cloned())
            .collect()
    }

    /// The fix with the newest timestamp for a bus.
    pub fn current_location(&self, bus_id: VehicleId) -> Option<&Location> {
        self.latest.get(&bus_id)
    }

    /// Full shape of an active bus.
    pub fn vehicle(&self, id: VehicleId) -> Option<Vehicle> {
        self.active_bus(id).map(|bus| self.vehicle_view(bus))
    }

    /// Full shape of every active bus, optionally limited to one route.
    pub fn vehicles(&self, route: Option<RouteId>) -> Vec<Vehicle> {
        self.active_buses(route)
            .map(|bus| self.vehicle_view(bus))
            .collect()
    }

    /// Tracking shape of every active bus, optionally limited to one route.
    pub fn tracking(&self, route: Option<RouteId>) -> Vec<TrackedBus> {
        self.active_buses(route)
            .map(|bus| {
                let route = bus.route_id.and_then(|id| self.routes.get(&id));
                TrackedBus {
                    id: bus.id,
                    bus_number: bus.bus_number.clone(),
                    route_id: bus.route_id,
                    route_number: route.map(|r| r.number.clone()),
                    route_color: route.map(|r| r.color.clone()),
                    current_location: self.current_location(bus.id).cloned(),
                }
            })
            .collect()
    }

    /// Stored fixes, newest first.
    pub fn locations(&self, bus: Option<VehicleId>, since: Option<DateTime<Utc>>) -> Vec<Location> {
        let mut locations: Vec<Location> = self
            .history
            .iter()
            .filter(|record| bus.is_none_or(|id| record.bus_id == id))
            .filter(|record| {
                since.is_none_or(|cutoff| record.location.timestamp.is_some_and(|ts| ts >= cutoff))
            })
            .map(|record| record.location.clone())
            .collect();
        locations.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        locations
    }

    /// Latest fix of every active bus that has reported at least once.
    pub fn latest_locations(&self) -> Vec<LatestLocation> {
        self.active_buses(None)
            .filter_map(|bus| {
                let location = self.current_location(bus.id)?.clone();
                let route = bus.route_id.and_then(|id| self.routes.get(&id));
                Some(LatestLocation {
                    location,
                    bus_info: BusInfo {
                        id: bus.id,
                        bus_number: bus.bus_number.clone(),
                        route_number: route.map(|r| r.number.clone()).unwrap_or_default(),
                        route_color: route.map(|r| r.color.clone()).unwrap_or_default(),
                    },
                })
            })
            .collect()
    }

    fn active_bus(&self, id: VehicleId) -> Option<&BusRecord> {
        self.buses.get(&id).filter(|bus| bus.active)
    }

    fn active_buses(&self, route: Option<RouteId>) -> impl Iterator<Item = &BusRecord> {
        self.buses
            .values()
            .filter(move |bus| bus.active && route.is_none_or(|id| bus.route_id == Some(id)))
    }

    fn route_view(&self, route: &Route) -> Route {
        let count = self.active_buses(Some(route.id)).count();
        Route {
            stops: route.ordered_stops().into_iter().cloned().collect(),
            buses_count: u32::try_from(count).unwrap_or(u32::MAX),
            ..route.clone()
        }
    }

    fn vehicle_view(&self, bus: &BusRecord) -> Vehicle {
        Vehicle {
            id: bus.id,
            number: bus.bus_number.clone(),
            license_plate: bus.license_plate.clone(),
            capacity: Some(bus.capacity),
            driver_name: Some(bus.driver_name.clone()).filter(|name| !name.trim().is_empty()),
            route: bus
                .route_id
                .and_then(|id| self.routes.get(&id))
                .map(Route::summary),
            current_location: self.current_location(bus.id).cloned(),
        }
    }
}

/// Shared state for the Axum application.
///
/// The broadcast sender pushes location updates to every connected
/// `WebSocket` channel. The fleet sits behind a read-write lock.
#[derive(Clone)]
pub struct FeedState {
    /// Broadcast sender for location updates.
    pub tx: broadcast::Sender<LocationBroadcast>,
    /// Routes, buses, and location history.
    pub fleet: Arc<RwLock<Fleet>>,
}

impl FeedState {
    /// Create a state serving the given fleet.
    pub fn new(fleet: Fleet) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            fleet: Arc::new(RwLock::new(fleet)),
        }
    }

    /// Subscribe to location updates.
    pub fn subscribe(&self) -> broadcast::Receiver<LocationBroadcast> {
        self.tx.subscribe()
    }

    /// Publish a location update to all connected channels.
    ///
    /// Returns the number of receivers. Zero is normal when no channel is open.
    pub fn broadcast(&self, update: &LocationBroadcast) -> usize {
        self.tx.send(update.clone()).unwrap_or(0)
    }

    /// Store a reported fix and broadcast it.
    ///
    /// Returns `None` without broadcasting when the bus is unknown or inactive.
    pub async fn record_location(
        &self,
        bus_id: VehicleId,
        report: LocationReport,
        at: DateTime<Utc>,
    ) -> Option<LocationBroadcast> {
        let update = {
            let mut fleet = self.fleet.write().await;
            if !fleet.has_bus(bus_id) {
                return None;
            }
            fleet.record_location(bus_id, report, at)?
        };
        let receivers = self.broadcast(&update);
        tracing::debug!(bus_id = %bus_id, receivers, "Location update broadcast");
        Some(update)
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new(Fleet::new())
    }
}
