//! Integration tests for the feed REST endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use bustrack_feed::{FeedState, build_router, sample_data};
use bustrack_types::{RouteId, VehicleId};
use chrono::{TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use tower::ServiceExt;

fn make_test_state() -> Arc<FeedState> {
    let a_minute_ago = Utc::now().checked_sub_signed(TimeDelta::minutes(1)).unwrap();
    let fleet = sample_data(&mut StdRng::seed_from_u64(11), a_minute_ago);
    Arc::new(FeedState::new(fleet))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// =========================================================================
// Routes
// =========================================================================

#[tokio::test]
async fn test_list_routes() {
    let (status, json) = get(build_router(make_test_state()), "/api/routes/").await;

    assert_eq!(status, StatusCode::OK);
    let routes = json.as_array().unwrap();
    assert_eq!(routes.len(), 3);
    assert_eq!(routes[0]["route_number"], "101");
    assert_eq!(routes[0]["color"], "#FF6B35");
    assert_eq!(routes[0]["buses_count"], 2);
    assert_eq!(routes[0]["stops"][0]["stop_name"], "Central Station");
    assert_eq!(routes[0]["stops"][4]["stop_order"], 5);
}

#[tokio::test]
async fn test_get_route_and_stops() {
    let state = make_test_state();

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/routes/2/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "University Express");

    let (status, json) = get(build_router(state), "/api/routes/2/stops/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 4);
    assert_eq!(json[0]["stop_name"], "University Gate");
}

#[tokio::test]
async fn test_get_route_not_found() {
    let state = make_test_state();

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/routes/99/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("route 99"));

    let (status, _) = get(build_router(state), "/api/routes/abc/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_route_buses_use_tracking_shape() {
    let (status, json) = get(build_router(make_test_state()), "/api/routes/1/buses/").await;

    assert_eq!(status, StatusCode::OK);
    let buses = json.as_array().unwrap();
    assert_eq!(buses.len(), 2);
    assert_eq!(buses[0]["bus_number"], "B101A");
    assert_eq!(buses[0]["route_color"], "#FF6B35");
    assert!(buses[0].get("license_plate").is_none());
    assert!(buses[0]["current_location"]["latitude"].is_number());
}

// =========================================================================
// Buses
// =========================================================================

#[tokio::test]
async fn test_list_buses_with_route_filter() {
    let state = make_test_state();

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/buses/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 4);

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/buses/?route=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["route"]["route_number"], "101");

    let (status, json) = get(build_router(state), "/api/buses/?route=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_get_bus() {
    let (status, json) = get(build_router(make_test_state()), "/api/buses/3/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bus_number"], "B202A");
    assert_eq!(json["license_plate"], "NYC-2001");
    assert_eq!(json["driver_name"], "David Wilson");
    assert_eq!(json["capacity"], 50);
    assert_eq!(json["route"]["id"], 2);
}

#[tokio::test]
async fn test_bus_tracking_lists_every_bus() {
    let (status, json) = get(build_router(make_test_state()), "/api/buses/tracking/").await;

    assert_eq!(status, StatusCode::OK);
    let numbers: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|bus| bus["bus_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, ["B101A", "B101B", "B202A", "B303A"]);
}

// =========================================================================
// Location reports
// =========================================================================

#[tokio::test]
async fn test_update_location_records_and_broadcasts() {
    let state = make_test_state();
    let mut rx = state.subscribe();

    let (status, json) = post_json(
        build_router(Arc::clone(&state)),
        "/api/buses/1/update_location/",
        r#"{"latitude": "40.7600", "longitude": -73.9800, "speed": 25.5}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["speed"], 25.5);

    let update = rx.recv().await.unwrap();
    assert_eq!(update.bus_id, VehicleId(1));
    assert_eq!(update.route_id, Some(RouteId(1)));
    assert!((update.location.latitude - 40.76).abs() < 1e-9);

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/buses/1/locations/").await;
    assert_eq!(status, StatusCode::OK);
    let history = json.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["speed"], 25.5);

    let (_, json) = get(build_router(state), "/api/buses/1/").await;
    assert_eq!(json["current_location"]["speed"], 25.5);
}

#[tokio::test]
async fn test_update_location_rejects_bad_input() {
    let state = make_test_state();

    let (status, json) = post_json(
        build_router(Arc::clone(&state)),
        "/api/buses/1/update_location/",
        r#"{"latitude": "north"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);

    let (status, _) = post_json(
        build_router(Arc::clone(&state)),
        "/api/buses/1/update_location/",
        r#"{"latitude": 95.0, "longitude": 0.0}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        build_router(state),
        "/api/buses/42/update_location/",
        r#"{"latitude": 40.0, "longitude": -73.0}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bus_history_window() {
    let state = make_test_state();

    let (_, json) = get(
        build_router(Arc::clone(&state)),
        "/api/buses/2/locations/?hours=0",
    )
    .await;
    assert!(json.as_array().unwrap().is_empty());

    let (_, json) = get(build_router(state), "/api/buses/2/locations/?hours=soon").await;
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_locations_filters() {
    let state = make_test_state();

    let (status, json) = get(build_router(Arc::clone(&state)), "/api/locations/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 4);

    let (_, json) = get(build_router(Arc::clone(&state)), "/api/locations/?bus=4").await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (status, _) = get(build_router(state), "/api/locations/?bus=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_latest_locations_carry_bus_info() {
    let (status, json) = get(build_router(make_test_state()), "/api/locations/latest/").await;

    assert_eq!(status, StatusCode::OK);
    let latest = json.as_array().unwrap();
    assert_eq!(latest.len(), 4);
    assert_eq!(latest[3]["bus_info"]["bus_number"], "B303A");
    assert_eq!(latest[3]["bus_info"]["route_color"], "#009639");
    assert!(latest[3]["latitude"].is_number());
}

#[tokio::test]
async fn test_list_stops_by_route() {
    let state = make_test_state();

    let (_, json) = get(build_router(Arc::clone(&state)), "/api/stops/").await;
    assert_eq!(json.as_array().unwrap().len(), 9);

    let (_, json) = get(build_router(state), "/api/stops/?route=3").await;
    assert!(json.as_array().unwrap().is_empty());
}
