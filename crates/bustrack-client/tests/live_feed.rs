//! End-to-end tests against the reference feed server.
//!
//! Each test binds a fresh feed server on `127.0.0.1:0` and talks to it
//! over real HTTP and `WebSocket` connections.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bustrack_client::{
    ApiClient, ApiError, ConnectionManager, ConnectionState, ReconnectPolicy, WebSocketTransport,
    route_address,
};
use bustrack_core::{ApiConfig, Event, EventBus, EventKind, MergePolicy, Roster, RosterStore};
use bustrack_feed::{FeedState, ServerConfig, sample_data, spawn_server};
use bustrack_types::{LocationReport, RouteId, VehicleId};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const WAIT: Duration = Duration::from_secs(5);

async fn start_feed() -> (SocketAddr, JoinHandle<()>) {
    let fleet = sample_data(&mut StdRng::seed_from_u64(5), Utc::now());
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    spawn_server(&config, Arc::new(FeedState::new(fleet)))
        .await
        .unwrap()
}

fn api(addr: SocketAddr) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: format!("http://{addr}/api/"),
        ..ApiConfig::default()
    })
    .unwrap()
}

fn report(latitude: f64, longitude: f64) -> LocationReport {
    LocationReport {
        latitude,
        longitude,
        speed: Some(33.0),
        heading: Some(90.0),
        accuracy: Some(4.0),
    }
}

struct Live {
    bus: Arc<EventBus>,
    store: Arc<RosterStore>,
    manager: ConnectionManager,
}

fn live() -> Live {
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(RosterStore::new(MergePolicy::default()));
    let _attachment = store.attach(&bus);
    let manager = ConnectionManager::new(
        ReconnectPolicy::default(),
        Arc::clone(&bus),
        Arc::new(WebSocketTransport),
    );
    Live {
        bus,
        store,
        manager,
    }
}

async fn wait_for_roster<F>(rx: &mut watch::Receiver<Arc<Roster>>, predicate: F) -> Arc<Roster>
where
    F: FnMut(&Arc<Roster>) -> bool,
{
    let roster = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .unwrap()
        .unwrap();
    Arc::clone(&roster)
}

async fn wait_for_state(manager: &ConnectionManager, state: ConnectionState) {
    let mut rx = manager.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|current| *current == state))
        .await
        .unwrap()
        .unwrap();
}

// =========================================================================
// REST collaborator
// =========================================================================

#[tokio::test]
async fn rest_reads_match_the_sample_fleet() {
    let (addr, server) = start_feed().await;
    let api = api(addr);
    assert_eq!(api.base_url(), format!("http://{addr}/api"));

    let routes = api.fetch_routes().await.unwrap();
    assert_eq!(routes.len(), 3);
    assert_eq!(routes[0].buses_count, 2);

    let route = api.fetch_route(RouteId(2)).await.unwrap();
    assert_eq!(route.name, "University Express");

    let stops = api.fetch_route_stops(RouteId(1)).await.unwrap();
    let orders: Vec<u32> = stops.iter().map(|s| s.stop_order).collect();
    assert_eq!(orders, [1, 2, 3, 4, 5]);

    let on_route = api.fetch_buses(Some(RouteId(1))).await.unwrap();
    assert_eq!(on_route.len(), 2);
    assert!(on_route.iter().all(|v| v.route_id() == Some(RouteId(1))));

    let bus = api.fetch_bus(VehicleId(3)).await.unwrap();
    assert_eq!(bus.number, "B202A");
    assert_eq!(bus.driver_name.as_deref(), Some("David Wilson"));

    let tracking = api.fetch_bus_tracking().await.unwrap();
    assert_eq!(tracking.len(), 4);
    let route = tracking[3].route.as_ref().unwrap();
    assert_eq!(route.id, Some(RouteId(3)));
    assert_eq!(route.color.as_deref(), Some("#009639"));
    assert!(tracking[3].current_location.is_some());

    let route_buses = api.fetch_route_buses(RouteId(1)).await.unwrap();
    assert_eq!(route_buses.len(), 2);

    let latest = api.fetch_latest_locations().await.unwrap();
    assert_eq!(latest.len(), 4);
    assert_eq!(latest[0].bus_info.route_number, "101");

    server.abort();
}

#[tokio::test]
async fn reported_location_shows_up_in_history() {
    let (addr, server) = start_feed().await;
    let api = api(addr);

    let stored = api
        .update_bus_location(VehicleId(2), &report(40.7620, -73.9770))
        .await
        .unwrap();
    assert_eq!(stored.speed, Some(33.0));

    let history = api.fetch_bus_locations(VehicleId(2), 24).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!((history[0].latitude - 40.7620).abs() < 1e-9);

    let all = api.fetch_all_locations(None).await.unwrap();
    assert_eq!(all.len(), 5);
    let none = api.fetch_all_locations(Some(0)).await.unwrap();
    assert!(none.len() <= 1);

    server.abort();
}

#[tokio::test]
async fn collaborator_failures_are_reported_to_the_caller() {
    let (addr, server) = start_feed().await;
    let api = api(addr);

    let err = api.fetch_bus(VehicleId(99)).await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 404));

    server.abort();

    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = self::api(closed).fetch_routes().await.unwrap_err();
    assert!(matches!(err, ApiError::Request { .. }));
}

// =========================================================================
// Live channel
// =========================================================================

#[tokio::test]
async fn initial_data_fills_the_store_and_updates_patch_it() {
    let (addr, server) = start_feed().await;
    let Live {
        bus: _bus,
        store,
        manager,
    } = live();
    let mut roster_rx = store.subscribe();

    manager.connect(format!("ws://{addr}/ws/buses/"));
    let roster = wait_for_roster(&mut roster_rx, |r| r.len() == 4).await;
    assert!(manager.is_connected());
    assert_eq!(manager.reconnect_attempts(), 0);
    let before = roster.get(VehicleId(2)).unwrap().current_location.clone();

    api(addr)
        .update_bus_location(VehicleId(2), &report(40.7700, -73.9700))
        .await
        .unwrap();

    let roster = wait_for_roster(&mut roster_rx, |r| {
        r.get(VehicleId(2))
            .and_then(|v| v.current_location.as_ref())
            .is_some_and(|loc| (loc.latitude - 40.77).abs() < 1e-9)
    })
    .await;
    let after = roster.get(VehicleId(2)).unwrap();
    assert_ne!(after.current_location, before);
    assert_eq!(after.number, "B101B");
    assert_eq!(roster.len(), 4);

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    server.abort();
}

#[tokio::test]
async fn snapshot_request_is_answered_with_buses_update() {
    let (addr, server) = start_feed().await;
    let Live {
        bus,
        store: _store,
        manager,
    } = live();

    let updates = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&updates);
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    bus.on(EventKind::BusesUpdate, move |_event| {
        seen.fetch_add(1, Ordering::SeqCst);
        done_tx.send(())?;
        Ok(())
    });

    assert!(!manager.request_snapshot());

    manager.connect(format!("ws://{addr}/ws/buses/"));
    wait_for_state(&manager, ConnectionState::Connected).await;
    assert!(manager.request_snapshot());

    tokio::time::timeout(WAIT, done_rx.recv()).await.unwrap().unwrap();
    assert_eq!(updates.load(Ordering::SeqCst), 1);

    manager.disconnect();
    server.abort();
}

#[tokio::test]
async fn route_channel_only_carries_its_route() {
    let (addr, server) = start_feed().await;
    let Live {
        bus,
        store,
        manager,
    } = live();
    let mut roster_rx = store.subscribe();

    let patches = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&patches);
    // Generic listeners run before the store merges the typed event.
    bus.on(EventKind::Message, move |event| {
        if matches!(event, Event::Message(raw) if raw["type"] == "location_update") {
            seen.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });

    let fleet_address = format!("ws://{addr}/ws/buses/");
    manager.connect(route_address(&fleet_address, RouteId(2)));
    let roster = wait_for_roster(&mut roster_rx, |r| r.len() == 1).await;
    assert!(roster.get(VehicleId(3)).is_some());

    let api = api(addr);
    api.update_bus_location(VehicleId(1), &report(40.7590, -73.9850))
        .await
        .unwrap();
    api.update_bus_location(VehicleId(3), &report(40.8080, -73.9620))
        .await
        .unwrap();

    wait_for_roster(&mut roster_rx, |r| {
        r.get(VehicleId(3))
            .and_then(|v| v.current_location.as_ref())
            .is_some_and(|loc| (loc.latitude - 40.808).abs() < 1e-9)
    })
    .await;
    assert_eq!(patches.load(Ordering::SeqCst), 1);
    assert!(store.snapshot().get(VehicleId(1)).is_none());

    assert!(manager.request_route_snapshot());
    manager.disconnect();
    server.abort();
}
