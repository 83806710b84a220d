//! Random-walk movement simulator.
//!
//! Every tick, each active bus with a known position moves by a small
//! random offset and reports a new speed, heading, and accuracy. Reports
//! go through [`FeedState::record_location`] so connected channels receive
//! them as `location_update` frames.

use std::sync::Arc;
use std::time::Duration;

use bustrack_types::{LocationReport, VehicleId};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{FeedState, Fleet};

/// Largest per-tick change in latitude or longitude, in degrees.
pub const MAX_STEP_DEGREES: f64 = 0.001;

/// Shortest tick the simulator runs at. Shorter intervals are raised to it.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Produce one movement report per active bus that has a position.
pub fn simulate_step<R: Rng>(fleet: &Fleet, rng: &mut R) -> Vec<(VehicleId, LocationReport)> {
    fleet
        .tracking(None)
        .into_iter()
        .filter_map(|bus| {
            let current = bus.current_location?;
            let report = LocationReport {
                latitude: current.latitude + rng.random_range(-MAX_STEP_DEGREES..=MAX_STEP_DEGREES),
                longitude: current.longitude
                    + rng.random_range(-MAX_STEP_DEGREES..=MAX_STEP_DEGREES),
                speed: Some(rng.random_range(20.0..=60.0)),
                heading: Some(rng.random_range(0.0..=360.0)),
                accuracy: Some(rng.random_range(3.0..=10.0)),
            };
            Some((bus.id, report))
        })
        .collect()
}

/// Run [`simulate_step`] on a fixed interval in a background task.
///
/// An interval below [`MIN_INTERVAL`] (including zero) runs at
/// [`MIN_INTERVAL`].
pub fn spawn_simulator(state: Arc<FeedState>, interval: Duration) -> JoinHandle<()> {
    if interval < MIN_INTERVAL {
        warn!(requested = ?interval, using = ?MIN_INTERVAL, "Simulation interval too short");
    }
    let interval = interval.max(MIN_INTERVAL);
    info!(interval = ?interval, "Movement simulator started");
    tokio::spawn(async move {
        let mut rng = StdRng::from_os_rng();
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so the sample fixes
        // are served unchanged for one interval.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reports = {
                let fleet = state.fleet.read().await;
                simulate_step(&fleet, &mut rng)
            };
            let now = Utc::now();
            let count = reports.len();
            for (bus_id, report) in reports {
                state.record_location(bus_id, report, now).await;
            }
            debug!(count, "Simulated movement");
        }
    })
}
