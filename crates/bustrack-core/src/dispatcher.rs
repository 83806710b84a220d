//! Typed publish/subscribe registry.
//!
//! The [`EventDispatcher`] decouples the transport from the consumers that
//! care about its frames. Callbacks are grouped by event kind and invoked
//! synchronously, in registration order, on the publishing task.
//!
//! Registering the same callback twice for one kind is allowed and both
//! registrations fire. [`EventDispatcher::unsubscribe`] removes every
//! registration of a callback at once.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::error;

/// An event that knows which subscription list it belongs to.
pub trait Dispatch {
    /// The subscription key.
    type Kind: Copy + Eq + Hash + fmt::Debug;

    /// The kind this event is published under.
    fn kind(&self) -> Self::Kind;
}

/// A registered subscriber.
///
/// Identity is the `Arc` allocation: keep the handle returned by
/// [`EventDispatcher::on`] to unsubscribe later.
pub type Callback<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Ordered callback lists keyed by event kind.
pub struct EventDispatcher<E: Dispatch> {
    registry: RwLock<HashMap<E::Kind, Vec<Callback<E>>>>,
}

impl<E: Dispatch> EventDispatcher<E> {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Append `callback` to the list for `kind`. No uniqueness check.
    pub fn subscribe(&self, kind: E::Kind, callback: Callback<E>) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(callback);
    }

    /// Wrap a closure, subscribe it, and return the handle used to
    /// unsubscribe it.
    pub fn on<F>(&self, kind: E::Kind, f: F) -> Callback<E>
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callback: Callback<E> = Arc::new(f);
        self.subscribe(kind, Arc::clone(&callback));
        callback
    }

    /// Remove every registration of `callback` for `kind`.
    ///
    /// Returns how many registrations were removed.
    pub fn unsubscribe(&self, kind: E::Kind, callback: &Callback<E>) -> usize {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(list) = registry.get_mut(&kind) else {
            return 0;
        };
        let before = list.len();
        list.retain(|registered| !Arc::ptr_eq(registered, callback));
        let removed = before.saturating_sub(list.len());
        if list.is_empty() {
            registry.remove(&kind);
        }
        removed
    }

    /// Invoke every callback registered for the event's kind.
    ///
    /// Callbacks run in registration order. A callback that returns an
    /// error or panics is logged and skipped; the rest still run. The list
    /// is snapshotted before the first call, so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    ///
    /// Returns how many callbacks were invoked.
    pub fn publish(&self, event: &E) -> usize {
        let kind = event.kind();
        let callbacks: Vec<Callback<E>> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(?kind, index, error = %e, "subscriber failed");
                }
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_owned())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_owned());
                    error!(?kind, index, reason = %reason, "subscriber panicked");
                }
            }
        }
        callbacks.len()
    }

    /// Number of registrations for `kind`, duplicates included.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

impl<E: Dispatch> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Dispatch> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut map = f.debug_map();
        for (kind, list) in registry.iter() {
            map.entry(kind, &list.len());
        }
        map.finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Topic {
        Ping,
        Pong,
    }

    #[derive(Debug)]
    struct Note(Topic, u32);

    impl Dispatch for Note {
        type Kind = Topic;

        fn kind(&self) -> Topic {
            self.0
        }
    }

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        tag: &'static str,
    ) -> impl Fn(&Note) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |note| {
            log.lock().unwrap().push(format!("{tag}:{}", note.1));
            Ok(())
        }
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let dispatcher = EventDispatcher::<Note>::new();
        assert_eq!(dispatcher.publish(&Note(Topic::Ping, 1)), 0);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let dispatcher = EventDispatcher::<Note>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on(Topic::Ping, recorder(&log, "a"));
        dispatcher.on(Topic::Ping, recorder(&log, "b"));
        dispatcher.on(Topic::Pong, recorder(&log, "other"));

        assert_eq!(dispatcher.publish(&Note(Topic::Ping, 7)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7"]);
    }

    #[test]
    fn duplicate_registration_fires_twice() {
        let dispatcher = EventDispatcher::<Note>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback = dispatcher.on(Topic::Ping, recorder(&log, "dup"));
        dispatcher.subscribe(Topic::Ping, Arc::clone(&callback));

        assert_eq!(dispatcher.subscriber_count(Topic::Ping), 2);
        dispatcher.publish(&Note(Topic::Ping, 1));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn unsubscribe_removes_every_copy() {
        let dispatcher = EventDispatcher::<Note>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback = dispatcher.on(Topic::Ping, recorder(&log, "gone"));
        dispatcher.subscribe(Topic::Ping, Arc::clone(&callback));
        let kept = dispatcher.on(Topic::Ping, recorder(&log, "kept"));

        assert_eq!(dispatcher.unsubscribe(Topic::Ping, &callback), 2);
        dispatcher.publish(&Note(Topic::Ping, 3));

        assert_eq!(*log.lock().unwrap(), vec!["kept:3"]);
        assert_eq!(dispatcher.unsubscribe(Topic::Ping, &kept), 1);
        assert_eq!(dispatcher.subscriber_count(Topic::Ping), 0);
    }

    #[test]
    fn unsubscribe_only_touches_the_given_kind() {
        let dispatcher = EventDispatcher::<Note>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback = dispatcher.on(Topic::Ping, recorder(&log, "x"));
        dispatcher.subscribe(Topic::Pong, Arc::clone(&callback));

        assert_eq!(dispatcher.unsubscribe(Topic::Ping, &callback), 1);
        dispatcher.publish(&Note(Topic::Pong, 4));
        assert_eq!(*log.lock().unwrap(), vec!["x:4"]);
    }

    #[test]
    fn failing_subscribers_do_not_stop_siblings() {
        let dispatcher = EventDispatcher::<Note>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on(Topic::Ping, |_| Err(anyhow::anyhow!("boom")));
        dispatcher.on(Topic::Ping, |_| panic!("subscriber bug"));
        dispatcher.on(Topic::Ping, recorder(&log, "after"));

        assert_eq!(dispatcher.publish(&Note(Topic::Ping, 5)), 3);
        assert_eq!(*log.lock().unwrap(), vec!["after:5"]);

        // The dispatcher stays usable after a panic.
        dispatcher.publish(&Note(Topic::Ping, 6));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn callbacks_may_unsubscribe_during_publish() {
        let dispatcher = Arc::new(EventDispatcher::<Note>::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let target = dispatcher.on(Topic::Ping, recorder(&log, "target"));

        let inner = Arc::clone(&dispatcher);
        let handle = Arc::clone(&target);
        dispatcher.on(Topic::Ping, move |_| {
            inner.unsubscribe(Topic::Ping, &handle);
            Ok(())
        });

        dispatcher.publish(&Note(Topic::Ping, 1));
        dispatcher.publish(&Note(Topic::Ping, 2));
        assert_eq!(*log.lock().unwrap(), vec!["target:1"]);
    }
}
