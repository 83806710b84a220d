//! Shared observable roster.
//!
//! One [`RosterStore`] reconciles the feed once for the whole process. Views
//! read consistent snapshots synchronously through [`RosterStore::snapshot`]
//! or await changes through [`RosterStore::subscribe`]; none of them keep a
//! roster of their own.

use std::sync::Arc;

use bustrack_types::{FeedMessage, Vehicle};
use tokio::sync::watch;
use tracing::debug;

use crate::dispatcher::Callback;
use crate::events::{Event, EventBus, EventKind};
use crate::reconciler::{ApplyOutcome, MergePolicy, Roster};

/// Process-wide reconciled roster.
///
/// Writers go through [`Self::apply`] or [`Self::seed`]. Each change
/// publishes a new `Arc<Roster>`; snapshots already handed out are never
/// mutated.
#[derive(Debug)]
pub struct RosterStore {
    tx: watch::Sender<Arc<Roster>>,
}

impl RosterStore {
    /// An empty store using `policy` for location patches.
    pub fn new(policy: MergePolicy) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Roster::new(policy)));
        Self { tx }
    }

    /// Fold a feed message into the roster, notifying subscribers when it
    /// changed anything.
    pub fn apply(&self, message: &FeedMessage) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::UnknownVehicle;
        self.tx.send_if_modified(|roster| {
            outcome = Arc::make_mut(roster).apply(message);
            outcome.changed()
        });
        outcome
    }

    /// Replace the roster with vehicles fetched out of band, e.g. over REST
    /// before the live channel opens.
    pub fn seed(&self, vehicles: Vec<Vehicle>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::Replaced {
            count: 0,
            removed: 0,
        };
        self.tx.send_modify(|roster| {
            outcome = Arc::make_mut(roster).replace(vehicles);
        });
        outcome
    }

    /// The current roster.
    pub fn snapshot(&self) -> Arc<Roster> {
        Arc::clone(&self.tx.borrow())
    }

    /// A receiver that wakes on every roster change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Roster>> {
        self.tx.subscribe()
    }

    /// Subscribe this store to every feed kind on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) -> StoreAttachment {
        let store = Arc::clone(self);
        let callback: Callback<Event> = Arc::new(move |event: &Event| {
            if let Event::Feed(message) = event {
                let outcome = store.apply(message);
                debug!(kind = %EventKind::of(message), ?outcome, "roster merge");
            }
            Ok(())
        });
        for kind in EventKind::FEED {
            bus.subscribe(kind, Arc::clone(&callback));
        }
        StoreAttachment { callback }
    }
}

/// Handle returned by [`RosterStore::attach`].
#[must_use = "dropping the attachment leaves the store subscribed with no way to detach"]
pub struct StoreAttachment {
    callback: Callback<Event>,
}

impl StoreAttachment {
    /// Stop feeding the store from `bus`.
    pub fn detach(self, bus: &EventBus) {
        for kind in EventKind::FEED {
            bus.unsubscribe(kind, &self.callback);
        }
    }
}

impl std::fmt::Debug for StoreAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAttachment").finish_non_exhaustive()
    }
}
