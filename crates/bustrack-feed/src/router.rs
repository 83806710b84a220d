//! Axum router construction for the feed server.
//!
//! Assembles the REST endpoints and the two `WebSocket` channels into a
//! single [`Router`] with CORS enabled for browser clients.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::FeedState;
use crate::ws;

/// Build the complete Axum router for the feed server.
///
/// Paths keep their trailing slash, matching the addresses clients are
/// configured with. See [`handlers`] for the REST endpoint table.
pub fn build_router(state: Arc<FeedState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/buses/", get(ws::ws_buses))
        .route("/ws/route/{id}/", get(ws::ws_route))
        // Routes
        .route("/api/routes/", get(handlers::list_routes))
        .route("/api/routes/{id}/", get(handlers::get_route))
        .route("/api/routes/{id}/stops/", get(handlers::route_stops))
        .route("/api/routes/{id}/buses/", get(handlers::route_buses))
        // Buses
        .route("/api/buses/", get(handlers::list_buses))
        .route("/api/buses/tracking/", get(handlers::bus_tracking))
        .route("/api/buses/{id}/", get(handlers::get_bus))
        .route("/api/buses/{id}/locations/", get(handlers::bus_locations))
        .route(
            "/api/buses/{id}/update_location/",
            post(handlers::update_location),
        )
        // Locations & stops
        .route("/api/locations/", get(handlers::list_locations))
        .route("/api/locations/latest/", get(handlers::latest_locations))
        .route("/api/stops/", get(handlers::list_stops))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
