//! Built-in sample data: three routes, four buses, one fix per bus.

use bustrack_types::{LocationReport, Route, RouteId, Stop, StopId, VehicleId};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::state::{BusRecord, Fleet};

/// Radius, in degrees, of the random offset applied to each bus's
/// starting position.
pub const START_JITTER_DEGREES: f64 = 0.01;

struct SampleRoute {
    number: &'static str,
    name: &'static str,
    description: &'static str,
    color: &'static str,
    stops: &'static [(&'static str, f64, f64)],
}

const ROUTES: [SampleRoute; 3] = [
    SampleRoute {
        number: "101",
        name: "Downtown Loop",
        description: "Connects downtown area with main attractions",
        color: "#FF6B35",
        stops: &[
            ("Central Station", 40.7589, -73.9851),
            ("City Hall", 40.7614, -73.9776),
            ("Museum District", 40.7505, -73.9934),
            ("Shopping Center", 40.7549, -73.9840),
            ("Park Avenue", 40.7505, -73.9800),
        ],
    },
    SampleRoute {
        number: "202",
        name: "University Express",
        description: "Express route to university campus",
        color: "#004E89",
        stops: &[
            ("University Gate", 40.8075, -73.9626),
            ("Student Center", 40.8100, -73.9580),
            ("Library", 40.8050, -73.9550),
            ("Sports Complex", 40.8000, -73.9500),
        ],
    },
    SampleRoute {
        number: "303",
        name: "Airport Shuttle",
        description: "Direct service to airport",
        color: "#009639",
        stops: &[],
    },
];

/// `(bus_number, plate, route, driver, start_lat, start_lon)`
const BUSES: [(&str, &str, u32, &str, f64, f64); 4] = [
    ("B101A", "NYC-1001", 1, "John Smith", 40.7589, -73.9851),
    ("B101B", "NYC-1002", 1, "Mary Johnson", 40.7614, -73.9776),
    ("B202A", "NYC-2001", 2, "David Wilson", 40.8075, -73.9626),
    ("B303A", "NYC-3001", 3, "Sarah Brown", 40.7000, -73.8000),
];

const BUS_CAPACITY: u32 = 50;

/// Build the sample fleet.
///
/// Route keys are assigned 1, 2, 3 and bus keys 1 to 4 in declaration order.
/// Each bus gets one fix near its starting point, stamped `now`.
pub fn sample_data<R: Rng>(rng: &mut R, now: DateTime<Utc>) -> Fleet {
    let mut fleet = Fleet::new();
    let mut stop_key: u32 = 0;

    for (route_key, sample) in (1..).zip(ROUTES.iter()) {
        let mut stops = Vec::with_capacity(sample.stops.len());
        for (order, &(name, latitude, longitude)) in (1..).zip(sample.stops.iter()) {
            stop_key = stop_key.saturating_add(1);
            stops.push(Stop {
                id: StopId(stop_key),
                name: String::from(name),
                stop_order: order,
                latitude,
                longitude,
                estimated_time: None,
            });
        }
        fleet.insert_route(Route {
            id: RouteId(route_key),
            number: String::from(sample.number),
            name: String::from(sample.name),
            description: String::from(sample.description),
            color: String::from(sample.color),
            stops,
            buses_count: 0,
        });
    }

    for (bus_key, &(number, plate, route, driver, lat, lon)) in (1..).zip(BUSES.iter()) {
        let id = VehicleId(bus_key);
        fleet.insert_bus(BusRecord {
            id,
            bus_number: String::from(number),
            license_plate: String::from(plate),
            route_id: Some(RouteId(route)),
            capacity: BUS_CAPACITY,
            driver_name: String::from(driver),
            active: true,
        });
        let report = LocationReport {
            latitude: lat + rng.random_range(-START_JITTER_DEGREES..=START_JITTER_DEGREES),
            longitude: lon + rng.random_range(-START_JITTER_DEGREES..=START_JITTER_DEGREES),
            speed: Some(rng.random_range(20.0..=60.0)),
            heading: Some(rng.random_range(0.0..360.0)),
            accuracy: None,
        };
        fleet.record_location(id, report, now);
    }

    fleet
}
