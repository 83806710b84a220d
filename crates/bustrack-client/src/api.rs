//! REST collaborator client.
//!
//! Fetches routes, buses, and location history used to seed the roster
//! before the live channel delivers its first snapshot. All paths follow
//! the server's trailing-slash convention (`/routes/`, `/buses/{id}/`).

use std::time::Duration;

use bustrack_core::ApiConfig;
use bustrack_types::{
    LatestLocation, Location, LocationReport, Route, RouteId, Stop, Vehicle, VehicleId,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Default look-back window for a bus's location history.
pub const DEFAULT_HISTORY_HOURS: u32 = 24;

/// Client for the collaborator REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `config.base_url`.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|source| ApiError::Request {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    /// The normalised base URL (no trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(url = %url, "api request");
        let response = request.send().await.map_err(|source| {
            warn!(url = %url, error = %source, "api request failed");
            ApiError::Request {
                url: url.clone(),
                source,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, %status, "api returned error status");
            return Err(ApiError::Status { url, status });
        }

        response
            .json()
            .await
            .map_err(|source| ApiError::Request { url, source })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let request = self.client.get(&url);
        self.execute(url, request).await
    }

    /// All active routes with their stops.
    pub async fn fetch_routes(&self) -> Result<Vec<Route>, ApiError> {
        self.get("/routes/").await
    }

    /// One route.
    pub async fn fetch_route(&self, route: RouteId) -> Result<Route, ApiError> {
        self.get(&format!("/routes/{route}/")).await
    }

    /// Active stops of a route, in `stop_order`.
    pub async fn fetch_route_stops(&self, route: RouteId) -> Result<Vec<Stop>, ApiError> {
        self.get(&format!("/routes/{route}/stops/")).await
    }

    /// Active buses on a route, in the compact tracking shape.
    pub async fn fetch_route_buses(&self, route: RouteId) -> Result<Vec<Vehicle>, ApiError> {
        self.get(&format!("/routes/{route}/buses/")).await
    }

    /// Active buses, optionally only those on `route`.
    pub async fn fetch_buses(&self, route: Option<RouteId>) -> Result<Vec<Vehicle>, ApiError> {
        let url = self.url("/buses/");
        let mut request = self.client.get(&url);
        if let Some(route) = route {
            request = request.query(&[("route", route.into_inner())]);
        }
        self.execute(url, request).await
    }

    /// One bus.
    pub async fn fetch_bus(&self, bus: VehicleId) -> Result<Vehicle, ApiError> {
        self.get(&format!("/buses/{bus}/")).await
    }

    /// Location history of one bus over the last `hours`, newest first.
    pub async fn fetch_bus_locations(
        &self,
        bus: VehicleId,
        hours: u32,
    ) -> Result<Vec<Location>, ApiError> {
        let url = self.url(&format!("/buses/{bus}/locations/"));
        let request = self.client.get(&url).query(&[("hours", hours)]);
        self.execute(url, request).await
    }

    /// Report a new position for one bus. Returns the stored report.
    pub async fn update_bus_location(
        &self,
        bus: VehicleId,
        report: &LocationReport,
    ) -> Result<LocationReport, ApiError> {
        let url = self.url(&format!("/buses/{bus}/update_location/"));
        let request = self.client.post(&url).json(report);
        self.execute(url, request).await
    }

    /// Every recorded fix, optionally limited to the last `hours`.
    pub async fn fetch_all_locations(&self, hours: Option<u32>) -> Result<Vec<Location>, ApiError> {
        let url = self.url("/locations/");
        let mut request = self.client.get(&url);
        if let Some(hours) = hours {
            request = request.query(&[("hours", hours)]);
        }
        self.execute(url, request).await
    }

    /// Latest fix of each active bus.
    pub async fn fetch_latest_locations(&self) -> Result<Vec<LatestLocation>, ApiError> {
        self.get("/locations/latest/").await
    }

    /// Every active bus in the compact tracking shape.
    pub async fn fetch_bus_tracking(&self) -> Result<Vec<Vehicle>, ApiError> {
        self.get("/buses/tracking/").await
    }
}
