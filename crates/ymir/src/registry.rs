//! Auth state observers and ordered delivery.
//!
//! Observers are kept in registration order. Each notification is delivered
//! to a snapshot of the observers taken when the notification was raised, so
//! subscribing or unsubscribing from inside a callback never affects the
//! delivery already under way.

use gotrue_types::{AuthChangeEvent, Session};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Arc<dyn Fn(AuthChangeEvent, Option<&Session>) + Send + Sync>;

/// Identifier handed out for each registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Registered observers, ordered by subscription.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    observers: BTreeMap<SubscriptionId, AuthStateCallback>,
}

impl ObserverRegistry {
    pub(crate) fn insert(&mut self, callback: AuthStateCallback) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.observers.insert(id, callback);
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub(crate) fn snapshot(&self) -> Vec<AuthStateCallback> {
        self.observers.values().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.observers.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Handle returned by `on_auth_state_change`.
///
/// Dropping the handle keeps the observer registered; call
/// [`Subscription::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<ObserverRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<Mutex<ObserverRegistry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop delivering events to this observer. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if registry.lock().remove(self.id) {
            debug!(subscription = self.id.0, "Auth observer unsubscribed");
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

struct Notification {
    event: AuthChangeEvent,
    session: Option<Session>,
    observers: Vec<AuthStateCallback>,
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<Notification>,
    draining: bool,
}

/// FIFO of pending notifications with a single active drainer.
///
/// Notifications are enqueued while the engine's state lock is held, so the
/// queue order matches the order of state changes. Callbacks run only from
/// [`Dispatcher::drain`], which is called with no engine lock held. A
/// callback that triggers another state change enqueues it; the outer drain
/// delivers it after the current notification finishes.
#[derive(Default)]
pub(crate) struct Dispatcher {
    queue: Mutex<Queue>,
}

impl Dispatcher {
    pub(crate) fn enqueue(
        &self,
        event: AuthChangeEvent,
        session: Option<Session>,
        observers: Vec<AuthStateCallback>,
    ) {
        if observers.is_empty() {
            return;
        }
        self.queue.lock().pending.push_back(Notification {
            event,
            session,
            observers,
        });
    }

    pub(crate) fn drain(&self) {
        {
            let mut queue = self.queue.lock();
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(notification) => notification,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };
            deliver(next);
        }
    }
}

fn deliver(notification: Notification) {
    let Notification {
        event,
        session,
        observers,
    } = notification;
    for observer in observers {
        let outcome = catch_unwind(AssertUnwindSafe(|| observer(event, session.as_ref())));
        if outcome.is_err() {
            error!(event = %event, "Auth state observer panicked");
        }
    }
}
