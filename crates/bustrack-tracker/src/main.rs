//! Live bus tracker binary.
//!
//! The composition root: it builds the event bus, the shared roster store,
//! and the connection manager, then logs the bus list every time the
//! roster changes.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `bustrack.yaml` (or the path given as the
//!    first argument); a missing file means defaults
//! 2. Initialize structured logging (tracing)
//! 3. Build the event bus and attach the roster store
//! 4. Seed the roster from the REST collaborator (failure is logged, not fatal)
//! 5. Open the live channel and request a fresh snapshot shortly after
//! 6. Log list-view rows on every roster change until `Ctrl-C`
//! 7. Disconnect and detach

mod error;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bustrack_client::{
    ApiClient, ConnectionManager, ConnectionState, ReconnectPolicy, WebSocketTransport,
};
use bustrack_core::{
    Event, EventBus, EventKind, ListView, LoggingConfig, RosterStore, TrackerConfig,
};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::TrackerError;

const DEFAULT_CONFIG_PATH: &str = "bustrack.yaml";

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    // 1. Load configuration.
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = TrackerConfig::load_or_default(&path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        config = %path.display(),
        address = %config.connection.address,
        api = %config.api.base_url,
        merge_policy = ?config.reconciler.merge_policy,
        "bustrack-tracker starting"
    );

    // 3. Event bus and roster store.
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(RosterStore::new(config.reconciler.merge_policy));
    let attachment = store.attach(&bus);
    bus.on(EventKind::Disconnected, |event| {
        if let Event::Disconnected(close) = event {
            warn!(close = %close, "live channel lost");
        }
        Ok(())
    });

    // 4. Seed from REST.
    let api = ApiClient::new(&config.api)?;
    match api.fetch_buses(None).await {
        Ok(vehicles) => {
            let outcome = store.seed(vehicles);
            info!(?outcome, "Roster seeded from REST");
        }
        Err(e) => warn!(error = %e, "Initial fetch failed; waiting for live data"),
    }

    // 5. Live channel.
    let manager = ConnectionManager::new(
        ReconnectPolicy::from_config(&config.connection),
        Arc::clone(&bus),
        Arc::new(WebSocketTransport),
    );
    manager.connect(config.connection.address.clone());
    let requester = request_snapshot_after_connect(
        manager.clone(),
        Duration::from_millis(config.connection.snapshot_request_delay_ms),
    );

    // 6. Follow the roster.
    let list = ListView::default();
    let mut roster_rx = store.subscribe();
    report::log_rows(&list.rows(&store.snapshot(), Utc::now()));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown requested");
                break;
            }
            changed = roster_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let roster = Arc::clone(&roster_rx.borrow_and_update());
                report::log_rows(&list.rows(&roster, Utc::now()));
            }
        }
    }

    // 7. Dispose.
    requester.abort();
    manager.disconnect();
    attachment.detach(&bus);
    info!("bustrack-tracker stopped");
    Ok(())
}

/// Each time the channel opens, wait `delay` and ask for a fresh snapshot.
fn request_snapshot_after_connect(manager: ConnectionManager, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state_rx = manager.watch_state();
        loop {
            if state_rx
                .wait_for(|state| *state == ConnectionState::Connected)
                .await
                .is_err()
            {
                return;
            }
            tokio::time::sleep(delay).await;
            manager.request_snapshot();
            if state_rx
                .wait_for(|state| *state != ConnectionState::Connected)
                .await
                .is_err()
            {
                return;
            }
        }
    })
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
