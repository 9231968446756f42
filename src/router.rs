//! Bind-or-replace event handler registry.
//!
//! A view that re-mounts while the previous mount's handlers are still
//! attached ends up running every side effect twice per inbound message —
//! duplicate alerts, duplicate state writes. The [`EventRouter`] rules that
//! out structurally: handlers are keyed by [`EventKind`] and binding a kind
//! **replaces** the existing handler instead of stacking a second one, so at
//! most one handler per kind is ever live.
//!
//! [`EventRouter::bind_all`] returns a [`Disposer`] scoped to that binding:
//! calling [`Disposer::dispose`] (or dropping it) detaches exactly the
//! handlers that binding attached — never a handler a later binding has since
//! replaced — and is safe to call any number of times.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::event::{EventKind, HousieEvent};

/// A handler for one event kind.
pub type Handler = Box<dyn FnMut(&HousieEvent) + Send + 'static>;

struct Entry {
    /// Binding generation, used so a stale disposer cannot detach a
    /// replacement handler bound after it.
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<EventKind, Entry>,
}

impl Registry {
    fn bind(&mut self, kind: EventKind, handler: Handler) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.entries.insert(kind, Entry { id, handler }).is_some() {
            debug!(?kind, "replaced existing event handler");
        }
        id
    }
}

/// Registry holding at most one handler per [`EventKind`].
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct EventRouter {
    inner: Arc<Mutex<Registry>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or replace) the handler for one event kind and return the
    /// disposer for that single binding.
    pub fn bind(&self, kind: EventKind, handler: Handler) -> Disposer {
        self.bind_all(vec![(kind, handler)])
    }

    /// Bind (or replace) a batch of handlers and return one disposer covering
    /// all of them.
    ///
    /// If `bindings` names the same kind twice, the later entry wins — the
    /// registry never holds two handlers for one kind.
    pub fn bind_all(&self, bindings: Vec<(EventKind, Handler)>) -> Disposer {
        let mut bound = Vec::with_capacity(bindings.len());
        {
            let mut registry = lock_registry(&self.inner);
            for (kind, handler) in bindings {
                let id = registry.bind(kind, handler);
                bound.retain(|(k, _)| *k != kind);
                bound.push((kind, id));
            }
        }
        Disposer {
            inner: Arc::clone(&self.inner),
            bound,
        }
    }

    /// Dispatch an event to the bound handler for its kind, if any.
    ///
    /// Synthetic events (no [`EventKind`]) are not routable and return
    /// `false`, as does an event whose kind has no handler bound.
    pub fn dispatch(&self, event: &HousieEvent) -> bool {
        let Some(kind) = event.kind() else {
            return false;
        };
        let mut registry = lock_registry(&self.inner);
        match registry.entries.get_mut(&kind) {
            Some(entry) => {
                (entry.handler)(event);
                true
            }
            None => false,
        }
    }

    /// Number of handlers currently bound.
    pub fn handler_count(&self) -> usize {
        lock_registry(&self.inner).entries.len()
    }

    /// Drain `events` into this router until the channel closes or the
    /// terminal `Disconnected` event arrives.
    ///
    /// Convenience pump for presentation layers that prefer per-kind
    /// callbacks over matching on the receiver themselves.
    pub async fn pump(&self, events: &mut mpsc::Receiver<HousieEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
            if matches!(event, HousieEvent::Disconnected { .. }) {
                break;
            }
        }
    }
}

/// Lock the registry, recovering from a poisoned lock — a handler that
/// panicked must not wedge every other binding.
fn lock_registry(inner: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

/// Detaches the handlers one [`EventRouter::bind_all`] call attached.
///
/// Disposing is idempotent, and dropping an undisposed `Disposer` disposes
/// it, so a view teardown can never leak its handlers.
#[must_use = "dropping the disposer detaches the handlers it bound"]
pub struct Disposer {
    inner: Arc<Mutex<Registry>>,
    bound: Vec<(EventKind, u64)>,
}

impl Disposer {
    /// Detach every handler this disposer's binding attached — never more
    /// (a replacement bound later stays), never fewer.
    pub fn dispose(&mut self) {
        if self.bound.is_empty() {
            return;
        }
        let mut registry = lock_registry(&self.inner);
        for (kind, id) in self.bound.drain(..) {
            // Only remove the entry if it is still ours; a later bind for the
            // same kind has already detached our handler.
            if registry.entries.get(&kind).is_some_and(|e| e.id == id) {
                registry.entries.remove(&kind);
            }
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("bound", &self.bound.len())
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn error_event(msg: &str) -> HousieEvent {
        HousieEvent::ServerError {
            message: msg.into(),
        }
    }

    fn counting_handler(counter: &Arc<AtomicUsize>) -> Handler {
        let counter = Arc::clone(counter);
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn dispatch_reaches_the_bound_handler() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _d = router.bind(EventKind::Error, counting_handler(&count));

        assert!(router.dispatch(&error_event("boom")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rebinding_replaces_instead_of_stacking() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));

        // Two overlapping "view lifecycles" binding the same kind.
        let _d1 = router.bind(EventKind::Error, counting_handler(&count));
        let _d2 = router.bind(EventKind::Error, counting_handler(&count));
        assert_eq!(router.handler_count(), 1);

        // One inbound error runs exactly one handler.
        router.dispatch(&error_event("boom"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_all_covers_every_kind_once() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _d = router.bind_all(vec![
            (EventKind::RoomData, counting_handler(&count)),
            (EventKind::NewNumber, counting_handler(&count)),
            (EventKind::GameOver, counting_handler(&count)),
            (EventKind::GameReset, counting_handler(&count)),
            (EventKind::Error, counting_handler(&count)),
        ]);
        assert_eq!(router.handler_count(), 5);
    }

    #[test]
    fn dispose_detaches_everything_it_bound() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut disposer = router.bind_all(vec![
            (EventKind::Error, counting_handler(&count)),
            (EventKind::RoomData, counting_handler(&count)),
        ]);

        disposer.dispose();
        assert_eq!(router.handler_count(), 0);
        assert!(!router.dispatch(&error_event("boom")));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Idempotent.
        disposer.dispose();
    }

    #[test]
    fn stale_disposer_leaves_the_replacement_alone() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let mut first = router.bind(EventKind::Error, counting_handler(&count));
        let _second = router.bind(EventKind::Error, counting_handler(&count));

        // Disposing the superseded binding must not detach the live handler.
        first.dispose();
        assert_eq!(router.handler_count(), 1);
        assert!(router.dispatch(&error_event("boom")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_disposer_detaches() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let _d = router.bind(EventKind::Error, counting_handler(&count));
            assert_eq!(router.handler_count(), 1);
        }
        assert_eq!(router.handler_count(), 0);
    }

    #[test]
    fn synthetic_events_are_not_routable() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _d = router.bind(EventKind::Error, counting_handler(&count));

        assert!(!router.dispatch(&HousieEvent::Connected));
        assert!(!router.dispatch(&HousieEvent::ReplayPrompt));
        assert!(!router.dispatch(&HousieEvent::Disconnected { reason: None }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_kind_in_one_bind_all_keeps_the_later_handler() {
        let router = EventRouter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let _d = router.bind_all(vec![
            (EventKind::Error, counting_handler(&first)),
            (EventKind::Error, counting_handler(&second)),
        ]);

        router.dispatch(&error_event("boom"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pump_dispatches_until_disconnected() {
        let router = EventRouter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _d = router.bind(EventKind::Error, counting_handler(&count));

        let (tx, mut rx) = mpsc::channel(8);
        tx.send(error_event("one")).await.unwrap();
        tx.send(error_event("two")).await.unwrap();
        tx.send(HousieEvent::Disconnected { reason: None })
            .await
            .unwrap();

        router.pump(&mut rx).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
