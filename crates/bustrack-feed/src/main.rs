//! Feed server binary.
//!
//! Serves the sample fleet over REST and `WebSocket`, optionally moving the
//! buses with the random-walk simulator.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `bustrack.yaml` (or the path given as the
//!    first argument); a missing file means defaults
//! 2. Initialize structured logging (tracing)
//! 3. Build the sample fleet
//! 4. Start the movement simulator when `feed.simulate` is set
//! 5. Serve until the process is terminated

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bustrack_core::{LoggingConfig, TrackerConfig};
use bustrack_feed::{FeedState, ServerConfig, sample_data, spawn_simulator, start_server};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "bustrack.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = TrackerConfig::load_or_default(&path)?;

    init_tracing(&config.logging);
    info!(config = %path.display(), "bustrack-feed starting");

    let fleet = sample_data(&mut rand::rng(), Utc::now());
    let state = Arc::new(FeedState::new(fleet));
    let (routes, buses) = {
        let fleet = state.fleet.read().await;
        (fleet.routes().len(), fleet.vehicles(None).len())
    };
    info!(routes, buses, "Sample data loaded");

    let _simulator = config.feed.simulate.then(|| {
        spawn_simulator(
            Arc::clone(&state),
            Duration::from_millis(config.feed.simulation_interval_ms),
        )
    });

    start_server(&ServerConfig::from(&config.feed), state).await?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
