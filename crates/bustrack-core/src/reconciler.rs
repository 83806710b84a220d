//! Roster reconciliation.
//!
//! A [`Roster`] folds inbound feed messages into a map of vehicle id to the
//! latest known [`Vehicle`]. Full snapshots replace the whole map; location
//! patches replace a single vehicle's `current_location` and nothing else.
//!
//! # Merge ordering
//!
//! Under [`MergePolicy::ArrivalOrder`] (the default) messages are applied in
//! the order they are delivered; the last one processed wins even if it
//! carries an older timestamp. [`MergePolicy::MonotonicTimestamps`] instead
//! drops a patch whose fix is older than the one already held.

use std::collections::BTreeMap;

use bustrack_types::{FeedMessage, Location, RouteId, Vehicle, VehicleId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How location patches are ordered against each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Last delivered patch wins.
    #[default]
    ArrivalOrder,
    /// A patch older than the held fix is dropped.
    MonotonicTimestamps,
}

/// What applying a message did to the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A full snapshot replaced the roster.
    Replaced {
        /// Vehicles now in the roster.
        count: usize,
        /// Ids that were present before and are gone now.
        removed: usize,
    },
    /// A patch replaced one vehicle's location.
    Patched,
    /// A patch named a vehicle the roster does not hold; dropped.
    UnknownVehicle,
    /// A patch was older than the held fix; dropped.
    Stale,
}

impl ApplyOutcome {
    /// Whether the roster changed.
    pub const fn changed(self) -> bool {
        matches!(self, Self::Replaced { .. } | Self::Patched)
    }
}

/// The reconciled vehicle roster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    vehicles: BTreeMap<VehicleId, Vehicle>,
    policy: MergePolicy,
}

impl Roster {
    /// An empty roster using `policy` for patches.
    pub const fn new(policy: MergePolicy) -> Self {
        Self {
            vehicles: BTreeMap::new(),
            policy,
        }
    }

    /// The patch ordering policy in force.
    pub const fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Fold one feed message into the roster.
    pub fn apply(&mut self, message: &FeedMessage) -> ApplyOutcome {
        match message {
            FeedMessage::InitialData { buses, .. }
            | FeedMessage::BusesUpdate { buses }
            | FeedMessage::RouteBusesUpdate { buses, .. } => self.replace(buses.iter().cloned()),
            FeedMessage::LocationUpdate { bus_id, location } => {
                self.patch_location(*bus_id, location.clone())
            }
        }
    }

    /// Replace the whole roster. When an id repeats, the later entry wins.
    pub fn replace(&mut self, vehicles: impl IntoIterator<Item = Vehicle>) -> ApplyOutcome {
        let next: BTreeMap<VehicleId, Vehicle> = vehicles
            .into_iter()
            .map(|vehicle| (vehicle.id, vehicle))
            .collect();
        let removed = self
            .vehicles
            .keys()
            .filter(|id| !next.contains_key(id))
            .count();
        self.vehicles = next;
        ApplyOutcome::Replaced {
            count: self.vehicles.len(),
            removed,
        }
    }

    /// Replace the `current_location` of vehicle `id`.
    ///
    /// Patches for ids not in the roster are dropped; they never insert.
    pub fn patch_location(&mut self, id: VehicleId, location: Location) -> ApplyOutcome {
        let Some(vehicle) = self.vehicles.get_mut(&id) else {
            debug!(bus_id = %id, "dropping location patch for unknown vehicle");
            return ApplyOutcome::UnknownVehicle;
        };

        if self.policy == MergePolicy::MonotonicTimestamps
            && is_older(&location, vehicle.current_location.as_ref())
        {
            debug!(bus_id = %id, "dropping out-of-order location patch");
            return ApplyOutcome::Stale;
        }

        vehicle.current_location = Some(location);
        ApplyOutcome::Patched
    }

    /// Look up one vehicle.
    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    /// Number of vehicles held.
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Vehicle ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.keys().copied()
    }

    /// All vehicles, ordered by id.
    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Vehicles whose route id is `route`. Read-only; the roster is untouched.
    pub fn on_route(&self, route: RouteId) -> impl Iterator<Item = &Vehicle> {
        self.vehicles
            .values()
            .filter(move |vehicle| vehicle.route_id() == Some(route))
    }
}

/// True when both fixes are timestamped and `incoming` predates `held`.
fn is_older(incoming: &Location, held: Option<&Location>) -> bool {
    match (incoming.timestamp, held.and_then(|loc| loc.timestamp)) {
        (Some(new), Some(old)) => new < old,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bustrack_types::RouteSummary;
    use chrono::{DateTime, Duration, Utc};

    use super::*;

    fn vehicle(id: u32, route: Option<u32>) -> Vehicle {
        Vehicle {
            id: VehicleId(id),
            number: format!("B{id}"),
            license_plate: format!("NYC-{id}"),
            capacity: Some(50),
            driver_name: Some("Driver".to_owned()),
            route: route.map(|r| RouteSummary {
                id: Some(RouteId(r)),
                number: r.to_string(),
                name: String::new(),
                color: None,
            }),
            current_location: None,
        }
    }

    fn fix(lat: f64, lon: f64, at: DateTime<Utc>) -> Location {
        Location::at(lat, lon, Some(at))
    }

    fn snapshot(ids: &[u32]) -> FeedMessage {
        FeedMessage::InitialData {
            buses: ids.iter().map(|&id| vehicle(id, Some(1))).collect(),
            route_id: None,
        }
    }

    #[test]
    fn initial_snapshot_populates_roster() {
        let mut roster = Roster::default();
        let outcome = roster.apply(&snapshot(&[1, 2]));
        assert_eq!(outcome, ApplyOutcome::Replaced { count: 2, removed: 0 });
        assert_eq!(roster.ids().collect::<Vec<_>>(), vec![VehicleId(1), VehicleId(2)]);
    }

    #[test]
    fn patch_changes_only_the_target_location() {
        let mut roster = Roster::default();
        roster.apply(&snapshot(&[1, 2]));
        let before = roster.clone();
        let at = Utc::now();

        let outcome = roster.apply(&FeedMessage::LocationUpdate {
            bus_id: VehicleId(1),
            location: fix(10.0, 20.0, at),
        });
        assert_eq!(outcome, ApplyOutcome::Patched);

        let patched = roster.get(VehicleId(1)).unwrap();
        assert_eq!(patched.current_location, Some(fix(10.0, 20.0, at)));

        let mut expected = before.get(VehicleId(1)).unwrap().clone();
        expected.current_location = Some(fix(10.0, 20.0, at));
        assert_eq!(patched, &expected);
        assert_eq!(roster.get(VehicleId(2)), before.get(VehicleId(2)));
    }

    #[test]
    fn patch_for_unknown_vehicle_is_dropped() {
        let mut roster = Roster::default();
        roster.apply(&snapshot(&[1]));
        let before = roster.clone();

        let outcome = roster.patch_location(VehicleId(99), fix(1.0, 1.0, Utc::now()));
        assert_eq!(outcome, ApplyOutcome::UnknownVehicle);
        assert!(!outcome.changed());
        assert_eq!(roster, before);
    }

    #[test]
    fn snapshot_removes_absent_ids() {
        let mut roster = Roster::default();
        roster.apply(&snapshot(&[1, 2, 3]));
        let outcome = roster.apply(&FeedMessage::BusesUpdate {
            buses: vec![vehicle(2, Some(1))],
        });
        assert_eq!(outcome, ApplyOutcome::Replaced { count: 1, removed: 2 });
        assert!(roster.get(VehicleId(1)).is_none());
        assert!(roster.get(VehicleId(3)).is_none());
    }

    #[test]
    fn snapshot_discards_previous_locations() {
        let mut roster = Roster::default();
        roster.apply(&snapshot(&[1]));
        roster.patch_location(VehicleId(1), fix(5.0, 5.0, Utc::now()));
        roster.apply(&snapshot(&[1]));
        assert_eq!(roster.get(VehicleId(1)).unwrap().current_location, None);
    }

    #[test]
    fn duplicate_ids_in_snapshot_keep_the_last() {
        let mut roster = Roster::default();
        let mut second = vehicle(1, Some(1));
        second.number = "second".to_owned();
        roster.replace(vec![vehicle(1, Some(1)), second]);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get(VehicleId(1)).unwrap().number, "second");
    }

    #[test]
    fn arrival_order_lets_older_fix_overwrite_newer() {
        let mut roster = Roster::new(MergePolicy::ArrivalOrder);
        roster.apply(&snapshot(&[1]));
        let now = Utc::now();
        roster.patch_location(VehicleId(1), fix(2.0, 2.0, now));
        let outcome = roster.patch_location(VehicleId(1), fix(1.0, 1.0, now - Duration::seconds(30)));
        assert_eq!(outcome, ApplyOutcome::Patched);
        let held = roster.get(VehicleId(1)).unwrap().current_location.clone();
        assert_eq!(held, Some(fix(1.0, 1.0, now - Duration::seconds(30))));
    }

    #[test]
    fn monotonic_policy_drops_older_fix() {
        let mut roster = Roster::new(MergePolicy::MonotonicTimestamps);
        roster.apply(&snapshot(&[1]));
        let now = Utc::now();
        roster.patch_location(VehicleId(1), fix(2.0, 2.0, now));

        let stale = roster.patch_location(VehicleId(1), fix(1.0, 1.0, now - Duration::seconds(30)));
        assert_eq!(stale, ApplyOutcome::Stale);
        let newer = roster.patch_location(VehicleId(1), fix(3.0, 3.0, now + Duration::seconds(30)));
        assert_eq!(newer, ApplyOutcome::Patched);
        let untimed = roster.patch_location(VehicleId(1), Location::at(4.0, 4.0, None));
        assert_eq!(untimed, ApplyOutcome::Patched);
    }

    #[test]
    fn route_filter_is_read_only() {
        let mut roster = Roster::default();
        roster.replace(vec![vehicle(1, Some(1)), vehicle(2, Some(2)), vehicle(3, None)]);
        let on_two: Vec<VehicleId> = roster.on_route(RouteId(2)).map(|v| v.id).collect();
        assert_eq!(on_two, vec![VehicleId(2)]);
        assert_eq!(roster.len(), 3);
    }
}
