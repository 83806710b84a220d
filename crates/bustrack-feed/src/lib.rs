//! Reference feed server for the bus tracker.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** under `/api/` for routes, stops, buses, and
//!   location history, including `POST /api/buses/{id}/update_location/`
//! - **`WebSocket` channels** at `/ws/buses/` and `/ws/route/{id}/` that
//!   send an `initial_data` snapshot, answer snapshot requests, and forward
//!   `location_update` frames via [`tokio::sync::broadcast`]
//! - **Sample data** and a **movement simulator** so the server is useful
//!   without any external data source
//!
//! The server is the live counterpart the client crate is tested against.

pub mod error;
pub mod handlers;
pub mod router;
pub mod sample;
pub mod server;
pub mod simulate;
pub mod state;
pub mod ws;

pub use error::FeedError;
pub use router::build_router;
pub use sample::sample_data;
pub use server::{ServerConfig, ServerError, spawn_server, start_server};
pub use simulate::{simulate_step, spawn_simulator};
pub use state::{
    BusRecord, FeedState, Fleet, HISTORY_RETENTION_HOURS, LocationBroadcast, TrackedBus,
};
