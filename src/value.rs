use crate::node::{NodeId, ReactiveNode};
use crate::signal::{ChangeSignal, Signal, SubscriptionId};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

struct ObservableInner<T> {
    id: NodeId,
    value: RwLock<T>,
    /// Typed notification carrying the cell itself; listeners pull the value.
    changed: Signal<Observable<T>>,
    /// Bubbling notification carrying this node's id.
    change: ChangeSignal,
}

/// Mutable scalar cell that notifies listeners when its value changes.
///
/// Assigning a value equal to the current one (per `T: PartialEq`) is a no-op.
/// Otherwise the new value is stored, then [`value_changed`](Self::value_changed)
/// fires with the cell itself, then the change signal fires with this node's id.
/// Both have fired by the time [`set`](Self::set) returns.
///
/// Listeners read the value when they run, not when `set` was called: if an
/// earlier listener assigns again, later listeners see that newer value.
///
/// `Observable` is a handle; clones share the cell.
///
/// # Example
/// ```ignore
/// let hp = Observable::new(100.0f32);
/// hp.on_changed(|v| println!("hp is now {v}"));
///
/// hp.set(100.0);   // equal, nothing fires
/// hp.set(80.0);    // prints "hp is now 80"
/// assert_eq!(hp.get(), 80.0);
/// ```
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a cell holding `value`. Nothing is emitted.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                id: NodeId::next(),
                value: RwLock::new(value),
                changed: Signal::new(),
                change: Signal::new(),
            }),
        }
    }

    /// Copy of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Run `f` on the current value without cloning it.
    ///
    /// `f` must not call [`set`](Self::set) on this cell.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Store `value` and notify, unless it equals the current value.
    ///
    /// Returns whether the value was stored. A stored value can still have its
    /// notifications dropped by the nesting limit of either signal.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.write();
            if *current == value {
                return false;
            }
            *current = value;
        }

        self.inner.changed.emit(self);
        self.inner.change.emit(&self.inner.id);
        true
    }

    /// Apply `f` to a copy of the current value and [`set`](Self::set) the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut value = self.get();
        f(&mut value);
        self.set(value)
    }

    /// Signal fired with this cell after each effective assignment.
    pub fn value_changed(&self) -> &Signal<Observable<T>> {
        &self.inner.changed
    }

    /// Subscribe to [`value_changed`](Self::value_changed) with a listener that
    /// receives the value current at the moment it runs.
    pub fn on_changed(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        self.inner
            .changed
            .subscribe(move |cell: &Observable<T>| listener(&cell.get()))
    }

    /// True if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Observable<T>
where
    T: Default + Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T> ReactiveNode for Observable<T> {
    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.inner.change
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner.value.read(), f)
    }
}
