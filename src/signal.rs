use crate::hash::{FastIndexMap, new_index_map};
use crate::node::NodeId;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Nesting limit applied to signals created with [`Signal::new`].
///
/// A listener that mutates the node it is reacting to re-enters `emit` on the
/// same signal. Emissions nested deeper than this are dropped.
pub const DEFAULT_MAX_EMIT_DEPTH: usize = 32;

/// The bubbling signal every reactive node exposes. The payload is the id of
/// the node that emitted it.
pub type ChangeSignal = Signal<NodeId>;

/// Identifies one registration on a [`Signal`].
///
/// Returned by [`Signal::subscribe`] and consumed by [`Signal::unsubscribe`].
/// Two registrations of the same closure get distinct ids.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw counter value, unique within the signal that issued it.
    pub fn get(self) -> u64 {
        self.0
    }
}

type Listener<P> = dyn Fn(&P) + Send + Sync;

struct SignalInner<P> {
    listeners: Mutex<FastIndexMap<SubscriptionId, Arc<Listener<P>>>>,
    next_id: AtomicU64,
    depth: AtomicUsize,
    max_depth: usize,
}

/// Ordered list of listeners invoked synchronously on [`emit`](Signal::emit).
///
/// `Signal` is a handle: clones share the same listener list. Nodes hand out
/// `&Signal` and parents keep a [`WeakSignal`] so that a child never keeps its
/// parent alive.
///
/// # Usage
/// ```ignore
/// let signal: Signal<i32> = Signal::new();
/// let id = signal.subscribe(|v| println!("got {v}"));
/// signal.emit(&7);          // prints "got 7"
/// signal.unsubscribe(id);
/// signal.emit(&8);          // nobody listening
/// ```
pub struct Signal<P> {
    inner: Arc<SignalInner<P>>,
}

impl<P> Signal<P> {
    /// Create a signal with no listeners and the default nesting limit.
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_EMIT_DEPTH)
    }

    /// Create a signal that drops emissions nested deeper than `max_depth`.
    ///
    /// A depth of 1 forbids any re-entrant emission of this signal.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                listeners: Mutex::new(new_index_map()),
                next_id: AtomicU64::new(1),
                depth: AtomicUsize::new(0),
                max_depth: max_depth.max(1),
            }),
        }
    }

    /// Register `listener`; it runs after every listener registered before it.
    pub fn subscribe(&self, listener: impl Fn(&P) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    /// Remove the registration `id`. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // shift_remove keeps the remaining listeners in registration order
        self.inner.listeners.lock().shift_remove(&id).is_some()
    }

    /// Invoke every listener with `payload`, in registration order.
    ///
    /// The listener list is snapshotted first and no lock is held while
    /// listeners run, so they may subscribe, unsubscribe or emit again.
    /// Returns `false` if the emission was dropped by the nesting limit.
    pub fn emit(&self, payload: &P) -> bool {
        let guard = DepthGuard::enter(&self.inner.depth);
        if guard.depth > self.inner.max_depth {
            tracing::warn!(
                depth = guard.depth,
                max_depth = self.inner.max_depth,
                "re-entrant emission exceeds the nesting limit, dropping it"
            );
            return false;
        }

        let snapshot: Vec<Arc<Listener<P>>> =
            self.inner.listeners.lock().values().cloned().collect();
        tracing::trace!(listeners = snapshot.len(), depth = guard.depth, "emit");

        for listener in snapshot {
            listener(payload);
        }
        true
    }

    /// Number of live registrations.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// True if `id` is still registered.
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.lock().contains_key(&id)
    }

    /// Nesting limit this signal was created with.
    pub fn max_depth(&self) -> usize {
        self.inner.max_depth
    }

    /// Non-owning handle to the same listener list.
    pub fn downgrade(&self) -> WeakSignal<P> {
        WeakSignal {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles point at the same listener list.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<P> Clone for Signal<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> Default for Signal<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for Signal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .field("max_depth", &self.inner.max_depth)
            .finish()
    }
}

/// Weak counterpart of [`Signal`], used by parents observing children.
pub struct WeakSignal<P> {
    inner: Weak<SignalInner<P>>,
}

impl<P> WeakSignal<P> {
    /// Recover a strong handle if the signal is still alive.
    pub fn upgrade(&self) -> Option<Signal<P>> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }
}

impl<P> Clone for WeakSignal<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for WeakSignal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSignal")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Counts one level of emission nesting; the level is released on drop, even
/// when a listener panics.
struct DepthGuard<'a> {
    counter: &'a AtomicUsize,
    depth: usize,
}

impl<'a> DepthGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let depth = counter.fetch_add(1, Ordering::AcqRel) + 1;
        Self { counter, depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn listeners_run_in_subscription_order() {
        let signal: Signal<i32> = Signal::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let log = log.clone();
            signal.subscribe(move |v| log.lock().push(format!("{name}:{v}")));
        }
        signal.emit(&1);

        assert_eq!(*log.lock(), ["a:1", "b:1", "c:1"]);
    }

    #[test]
    fn duplicate_subscriptions_each_run() {
        let signal: Signal<()> = Signal::new();
        let count = Arc::new(AtomicI32::new(0));
        let listener = {
            let count = count.clone();
            move |_: &()| {
                count.fetch_add(1, Ordering::Relaxed);
            }
        };

        let first = signal.subscribe(listener.clone());
        let second = signal.subscribe(listener);
        assert_ne!(first, second);

        signal.emit(&());
        assert_eq!(count.load(Ordering::Relaxed), 2);

        // Removing one registration leaves the other in place
        assert!(signal.unsubscribe(first));
        signal.emit(&());
        assert_eq!(count.load(Ordering::Relaxed), 3);
        assert!(!signal.unsubscribe(first));
    }

    #[test]
    fn unsubscribe_keeps_remaining_order() {
        let signal: Signal<()> = Signal::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut ids = Vec::new();
        for n in 0..4 {
            let log = log.clone();
            ids.push(signal.subscribe(move |_| log.lock().push(n)));
        }

        signal.unsubscribe(ids[1]);
        signal.emit(&());

        assert_eq!(*log.lock(), [0, 2, 3]);
    }

    #[test]
    fn listener_added_during_emit_waits_for_next_round() {
        let signal: Signal<()> = Signal::new();
        let late_calls = Arc::new(AtomicI32::new(0));

        let handle = signal.clone();
        let late = late_calls.clone();
        signal.subscribe(move |_| {
            let late = late.clone();
            handle.subscribe(move |_| {
                late.fetch_add(1, Ordering::Relaxed);
            });
        });

        signal.emit(&());
        assert_eq!(late_calls.load(Ordering::Relaxed), 0);

        signal.emit(&());
        assert_eq!(late_calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn nested_emission_stops_at_limit() {
        let signal: Signal<()> = Signal::with_max_depth(3);
        let calls = Arc::new(AtomicI32::new(0));

        let handle = signal.clone();
        let counter = calls.clone();
        signal.subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            handle.emit(&());
        });

        assert!(signal.emit(&()));
        assert_eq!(calls.load(Ordering::Relaxed), 3);

        // The depth counter unwinds, so a fresh emission runs again
        assert!(signal.emit(&()));
        assert_eq!(calls.load(Ordering::Relaxed), 6);
    }

    #[test]
    fn weak_handle_dies_with_signal() {
        let signal: Signal<()> = Signal::new();
        let weak = signal.downgrade();
        assert!(weak.upgrade().is_some_and(|s| s.ptr_eq(&signal)));

        drop(signal);
        assert!(weak.upgrade().is_none());
    }
}
