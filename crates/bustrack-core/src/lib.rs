//! Transport-free core of Bustrack.
//!
//! Everything between a decoded channel frame and what a view renders lives
//! here. The connection manager in `bustrack-client` feeds frames into an
//! [`EventBus`]; a single [`RosterStore`] subscribes to it and reconciles
//! them; list and map views read snapshots of the store.
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`dispatcher`] -- Typed publish/subscribe registry
//! - [`events`] -- Bus event types and inbound frame routing
//! - [`reconciler`] -- Snapshot/patch merging into a vehicle roster
//! - [`store`] -- Shared observable roster
//! - [`recency`] -- Fix age classification and formatting
//! - [`views`] -- List and map read views

pub mod config;
pub mod dispatcher;
pub mod events;
pub mod recency;
pub mod reconciler;
pub mod store;
pub mod views;

pub use config::{
    ApiConfig, ConfigError, ConnectionConfig, FeedConfig, LoggingConfig, ReconcilerConfig,
    TrackerConfig,
};
pub use dispatcher::{Callback, Dispatch, EventDispatcher};
pub use events::{CloseInfo, Event, EventBus, EventKind, dispatch_frame};
pub use recency::{Recency, format_age};
pub use reconciler::{ApplyOutcome, MergePolicy, Roster};
pub use store::{RosterStore, StoreAttachment};
pub use views::{Bounds, ListRow, ListView, MapView, Marker, RoutePath};
