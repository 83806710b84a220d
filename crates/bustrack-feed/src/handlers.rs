//! REST endpoint handlers for the feed server.
//!
//! All handlers read from or write to the in-memory [`Fleet`](crate::state::Fleet)
//! held by the shared [`FeedState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/routes/` | All routes with ordered stops |
//! | `GET` | `/api/routes/{id}/` | Single route |
//! | `GET` | `/api/routes/{id}/stops/` | Stops of a route |
//! | `GET` | `/api/routes/{id}/buses/` | Tracking shape of a route's buses |
//! | `GET` | `/api/buses/` | Active buses, `?route=` filter |
//! | `GET` | `/api/buses/tracking/` | Tracking shape of every bus |
//! | `GET` | `/api/buses/{id}/` | Single bus |
//! | `GET` | `/api/buses/{id}/locations/` | Fix history, `?hours=` (default 24) |
//! | `POST` | `/api/buses/{id}/update_location/` | Report a fix and broadcast it |
//! | `GET` | `/api/locations/` | All fixes, `?bus=` and `?hours=` filters |
//! | `GET` | `/api/locations/latest/` | Latest fix per bus |
//! | `GET` | `/api/stops/` | All stops, `?route=` filter |

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bustrack_types::{LocationReport, RouteId, VehicleId};
use chrono::{DateTime, TimeDelta, Utc};

use crate::error::FeedError;
use crate::state::{FeedState, HISTORY_RETENTION_HOURS};

/// History window applied by the per-bus locations endpoint.
pub const DEFAULT_HISTORY_HOURS: u32 = 24;

const _: () = assert!(HISTORY_RETENTION_HOURS >= DEFAULT_HISTORY_HOURS);

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// `?route=` filter.
#[derive(Debug, serde::Deserialize)]
pub struct RouteQuery {
    /// Route key to filter by.
    pub route: Option<String>,
}

/// `?hours=` window for a single bus's history.
#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    /// Look-back window in hours. Unparseable values fall back to the default.
    pub hours: Option<String>,
}

/// Filters for the fleet-wide locations endpoint.
#[derive(Debug, serde::Deserialize)]
pub struct LocationsQuery {
    /// Bus key to filter by.
    pub bus: Option<String>,
    /// Look-back window in hours. Unparseable values are ignored.
    pub hours: Option<String>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// List every route.
pub async fn list_routes(State(state): State<Arc<FeedState>>) -> impl IntoResponse {
    Json(state.fleet.read().await.routes())
}

/// Get a single route.
pub async fn get_route(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FeedError> {
    let id: RouteId = parse_key(&id, "route")?;
    let route = state
        .fleet
        .read()
        .await
        .route(id)
        .ok_or_else(|| FeedError::NotFound(format!("route {id}")))?;
    Ok(Json(route))
}

/// List the stops of a route in `stop_order`.
pub async fn route_stops(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FeedError> {
    let id: RouteId = parse_key(&id, "route")?;
    let stops = state
        .fleet
        .read()
        .await
        .route_stops(id)
        .ok_or_else(|| FeedError::NotFound(format!("route {id}")))?;
    Ok(Json(stops))
}

/// Tracking shape of every active bus on a route.
pub async fn route_buses(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FeedError> {
    let id: RouteId = parse_key(&id, "route")?;
    let fleet = state.fleet.read().await;
    if fleet.route(id).is_none() {
        return Err(FeedError::NotFound(format!("route {id}")));
    }
    Ok(Json(fleet.tracking(Some(id))))
}

// ---------------------------------------------------------------------------
// Buses
// ---------------------------------------------------------------------------

/// List active buses, optionally on one route.
pub async fn list_buses(
    State(state): State<Arc<FeedState>>,
    Query(query): Query<RouteQuery>,
) -> Result<impl IntoResponse, FeedError> {
    let route = parse_filter::<RouteId>(query.route.as_deref(), "route")?;
    Ok(Json(state.fleet.read().await.vehicles(route)))
}

/// Tracking shape of every active bus.
pub async fn bus_tracking(State(state): State<Arc<FeedState>>) -> impl IntoResponse {
    Json(state.fleet.read().await.tracking(None))
}

/// Get a single active bus.
pub async fn get_bus(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, FeedError> {
    let id: VehicleId = parse_key(&id, "bus")?;
    let vehicle = state
        .fleet
        .read()
        .await
        .vehicle(id)
        .ok_or_else(|| FeedError::NotFound(format!("bus {id}")))?;
    Ok(Json(vehicle))
}

/// Fix history of one bus, newest first.
pub async fn bus_locations(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, FeedError> {
    let id: VehicleId = parse_key(&id, "bus")?;
    let hours = query
        .hours
        .as_deref()
        .and_then(|h| h.trim().parse().ok())
        .unwrap_or(DEFAULT_HISTORY_HOURS);

    let fleet = state.fleet.read().await;
    if !fleet.has_bus(id) {
        return Err(FeedError::NotFound(format!("bus {id}")));
    }
    Ok(Json(fleet.locations(Some(id), cutoff(Utc::now(), hours))))
}

/// Record a reported fix and broadcast it as a `location_update`.
pub async fn update_location(
    State(state): State<Arc<FeedState>>,
    Path(id): Path<String>,
    body: Result<Json<LocationReport>, JsonRejection>,
) -> Result<impl IntoResponse, FeedError> {
    let id: VehicleId = parse_key(&id, "bus")?;
    let Json(report) = body.map_err(|e| FeedError::InvalidBody(e.body_text()))?;
    validate_report(&report)?;

    state
        .record_location(id, report.clone(), Utc::now())
        .await
        .ok_or_else(|| FeedError::NotFound(format!("bus {id}")))?;

    tracing::info!(bus_id = %id, "Location reported");
    Ok((StatusCode::CREATED, Json(report)))
}

// ---------------------------------------------------------------------------
// Locations & stops
// ---------------------------------------------------------------------------

/// Every stored fix, newest first.
pub async fn list_locations(
    State(state): State<Arc<FeedState>>,
    Query(query): Query<LocationsQuery>,
) -> Result<impl IntoResponse, FeedError> {
    let bus = parse_filter::<VehicleId>(query.bus.as_deref(), "bus")?;
    let since = query
        .hours
        .as_deref()
        .and_then(|h| h.trim().parse().ok())
        .and_then(|hours| cutoff(Utc::now(), hours));
    Ok(Json(state.fleet.read().await.locations(bus, since)))
}

/// Latest fix of every active bus.
pub async fn latest_locations(State(state): State<Arc<FeedState>>) -> impl IntoResponse {
    Json(state.fleet.read().await.latest_locations())
}

/// Every stop, optionally on one route.
pub async fn list_stops(
    State(state): State<Arc<FeedState>>,
    Query(query): Query<RouteQuery>,
) -> Result<impl IntoResponse, FeedError> {
    let route = parse_filter::<RouteId>(query.route.as_deref(), "route")?;
    Ok(Json(state.fleet.read().await.stops(route)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a path key. Keys that are not integers cannot match anything.
fn parse_key<T: FromStr>(raw: &str, entity: &str) -> Result<T, FeedError> {
    raw.parse()
        .map_err(|_parse_err| FeedError::NotFound(format!("{entity} {raw}")))
}

/// Parse an optional query filter. Blank means no filter.
fn parse_filter<T>(raw: Option<&str>, name: &str) -> Result<Option<T>, FeedError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| FeedError::InvalidQuery(format!("{name}={value}: {e}"))),
    }
}

fn cutoff(now: DateTime<Utc>, hours: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(i64::from(hours)).and_then(|window| now.checked_sub_signed(window))
}

fn validate_report(report: &LocationReport) -> Result<(), FeedError> {
    if !(-90.0..=90.0).contains(&report.latitude) {
        return Err(FeedError::InvalidBody(format!(
            "latitude {} out of range",
            report.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&report.longitude) {
        return Err(FeedError::InvalidBody(format!(
            "longitude {} out of range",
            report.longitude
        )));
    }
    Ok(())
}
