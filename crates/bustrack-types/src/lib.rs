//! Shared type definitions for Bustrack.
//!
//! This crate is the single source of truth for the vehicle data model and
//! the live-channel wire format. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for the web map.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe numeric wrappers for entity keys
//! - [`structs`] -- Vehicles, locations, routes, and stops
//! - [`messages`] -- Inbound/outbound channel frames and frame decoding

pub mod ids;
mod lenient;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{LocationId, RouteId, StopId, VehicleId};
pub use messages::{ClientMessage, DecodedFrame, FeedMessage, FrameError, decode_frame};
pub use structs::{
    BusInfo, LatestLocation, Location, LocationReport, Route, RouteSummary, Stop, Vehicle,
};
