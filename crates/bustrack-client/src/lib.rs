//! Network side of Bustrack.
//!
//! - [`connection`] -- [`ConnectionManager`], the reconnecting live channel
//! - [`transport`] -- the [`Transport`]/[`Channel`] seam and its WebSocket
//!   implementation
//! - [`api`] -- [`ApiClient`] for the REST collaborator endpoints
//! - [`error`] -- [`TransportError`] and [`ApiError`]

pub mod api;
pub mod connection;
pub mod error;
pub mod transport;

pub use api::{ApiClient, DEFAULT_HISTORY_HOURS};
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy, route_address};
pub use error::{ApiError, TransportError};
pub use transport::{Channel, ChannelEvent, Transport, WebSocketTransport};
