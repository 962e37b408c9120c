use crate::error::ObserverError;
use crate::node::{NodeHandle, NodeId, ReactiveNode};
use crate::signal::{ChangeSignal, Signal, SubscriptionId};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, Weak};

/// A stored item together with the list's subscription to its change signal.
struct Slot<V> {
    node: V,
    subscription: SubscriptionId,
}

impl<V: NodeHandle> Slot<V> {
    fn release(&self) {
        self.node.change_signal().unsubscribe(self.subscription);
    }
}

struct ListInner<V: NodeHandle> {
    id: NodeId,
    items: RwLock<Vec<Slot<V>>>,
    item_added: Signal<V>,
    item_removed: Signal<V>,
    item_changed: Signal<V>,
    change: ChangeSignal,
}

impl<V: NodeHandle> ListInner<V> {
    /// Subscribe the list to `node`. The closure only holds a weak handle, so
    /// an item never keeps its list alive.
    fn watch(self: &Arc<Self>, node: V) -> Slot<V> {
        let list: Weak<Self> = Arc::downgrade(self);
        let item = node.node_id();
        let subscription = node.change_signal().subscribe(move |_| {
            if let Some(list) = list.upgrade() {
                list.item_did_change(item);
            }
        });
        Slot { node, subscription }
    }

    fn item_did_change(&self, item: NodeId) {
        // Clone out of the lock; listeners may touch the list.
        let node = self
            .items
            .read()
            .iter()
            .find(|slot| slot.node.node_id() == item)
            .map(|slot| slot.node.clone());

        if let Some(node) = node {
            self.item_changed.emit(&node);
            self.emit_change();
        }
    }

    fn emit_change(&self) {
        self.change.emit(&self.id);
    }
}

impl<V: NodeHandle> Drop for ListInner<V> {
    fn drop(&mut self) {
        for slot in self.items.get_mut().iter() {
            slot.release();
        }
    }
}

/// Ordered sequence of reactive nodes with per-item and aggregate signals.
///
/// Every call that changes membership emits `item_added` / `item_removed`
/// once per affected item, then the change signal exactly once. Positional
/// overwrite ([`set`](Self::set)) and sorting emit only the change signal.
///
/// The list subscribes to each stored item, so mutating an item fires
/// `item_changed` with that item and then the list's change signal. The
/// subscription is released when the item leaves the list.
///
/// Items are compared by [`NodeId`]: `remove`, `contains` and `index_of` look
/// for the same node, not for a node holding an equal value.
///
/// No lock is held while listeners run. Comparators passed to the sort
/// methods do run under the write lock and must not touch the list.
pub struct ObservableList<V: NodeHandle> {
    inner: Arc<ListInner<V>>,
}

impl<V: NodeHandle> ObservableList<V> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListInner {
                id: NodeId::next(),
                items: RwLock::new(Vec::new()),
                item_added: Signal::new(),
                item_removed: Signal::new(),
                item_changed: Signal::new(),
                change: Signal::new(),
            }),
        }
    }

    /// Create a list holding `items`. The items are watched but nothing is emitted.
    pub fn from_items(items: impl IntoIterator<Item = V>) -> Self {
        let list = Self::new();
        let slots: Vec<_> = items.into_iter().map(|node| list.inner.watch(node)).collect();
        *list.inner.items.write() = slots;
        list
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    /// True if the list holds no item.
    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    /// Item at `index`, if any.
    pub fn get(&self, index: usize) -> Option<V> {
        self.inner.items.read().get(index).map(|slot| slot.node.clone())
    }

    /// Snapshot of the items in order.
    pub fn to_vec(&self) -> Vec<V> {
        self.inner.items.read().iter().map(|slot| slot.node.clone()).collect()
    }

    /// Position of the first occurrence of `item`.
    pub fn index_of(&self, item: &V) -> Option<usize> {
        let id = item.node_id();
        self.inner
            .items
            .read()
            .iter()
            .position(|slot| slot.node.node_id() == id)
    }

    /// True if `item` is stored at least once.
    pub fn contains(&self, item: &V) -> bool {
        self.index_of(item).is_some()
    }

    /// Append `item`.
    pub fn push(&self, item: V) {
        self.append(item);
    }

    /// [`push`](Self::push), returning the index the item was stored at. By
    /// the time this returns, listeners may have moved or removed it.
    pub(crate) fn append(&self, item: V) -> usize {
        let slot = self.inner.watch(item.clone());
        let index = {
            let mut items = self.inner.items.write();
            items.push(slot);
            items.len() - 1
        };

        self.inner.item_added.emit(&item);
        self.inner.emit_change();
        index
    }

    /// Insert `item` at `index`, shifting later items right.
    pub fn insert(&self, index: usize, item: V) -> Result<(), ObserverError> {
        {
            let mut items = self.inner.items.write();
            if index > items.len() {
                return Err(ObserverError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, self.inner.watch(item.clone()));
        }

        self.inner.item_added.emit(&item);
        self.inner.emit_change();
        Ok(())
    }

    /// Append every item of `items`, then emit one `item_added` per item
    /// and a single change. The change fires even when `items` is empty.
    pub fn extend(&self, items: impl IntoIterator<Item = V>) {
        let added: Vec<V> = items.into_iter().collect();
        {
            let slots = added.iter().map(|node| self.inner.watch(node.clone()));
            self.inner.items.write().extend(slots);
        }

        for item in &added {
            self.inner.item_added.emit(item);
        }
        self.inner.emit_change();
    }

    /// Remove the first occurrence of `item`. Returns whether it was found.
    pub fn remove(&self, item: &V) -> bool {
        let id = item.node_id();
        let slot = {
            let mut items = self.inner.items.write();
            match items.iter().position(|slot| slot.node.node_id() == id) {
                Some(index) => items.remove(index),
                None => return false,
            }
        };

        self.evicted(vec![slot]);
        true
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<V, ObserverError> {
        let slot = {
            let mut items = self.inner.items.write();
            if index >= items.len() {
                return Err(ObserverError::IndexOutOfRange {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };

        let node = slot.node.clone();
        self.evicted(vec![slot]);
        Ok(node)
    }

    /// Remove every item: one `item_removed` per item in order, then one change.
    pub fn clear(&self) {
        let slots = std::mem::take(&mut *self.inner.items.write());
        self.evicted(slots);
    }

    /// Clear, then push each of `items` individually.
    pub fn replace_all(&self, items: impl IntoIterator<Item = V>) {
        self.clear();
        for item in items {
            self.push(item);
        }
    }

    /// Overwrite the item at `index`.
    ///
    /// The overwrite emits only the change signal, not `item_removed` /
    /// `item_added`. Storing the node that is already there is a no-op and
    /// returns `Ok(false)`.
    pub fn set(&self, index: usize, item: V) -> Result<bool, ObserverError> {
        let old = {
            let mut items = self.inner.items.write();
            let len = items.len();
            let Some(current) = items.get_mut(index) else {
                return Err(ObserverError::IndexOutOfRange { index, len });
            };
            if current.node.node_id() == item.node_id() {
                return Ok(false);
            }
            std::mem::replace(current, self.inner.watch(item))
        };

        old.release();
        self.inner.emit_change();
        Ok(true)
    }

    /// Sort with `compare`, then emit the change signal.
    pub fn sort_by(&self, mut compare: impl FnMut(&V, &V) -> Ordering) {
        self.inner
            .items
            .write()
            .sort_by(|a, b| compare(&a.node, &b.node));
        self.inner.emit_change();
    }

    /// Sort by the key `f` extracts, then emit the change signal.
    pub fn sort_by_key<K: Ord>(&self, mut f: impl FnMut(&V) -> K) {
        self.inner.items.write().sort_by_key(|slot| f(&slot.node));
        self.inner.emit_change();
    }

    /// Sort only the items in `range`, then emit the change signal.
    pub fn sort_range_by(
        &self,
        range: Range<usize>,
        mut compare: impl FnMut(&V, &V) -> Ordering,
    ) -> Result<(), ObserverError> {
        {
            let mut items = self.inner.items.write();
            if range.start > range.end || range.end > items.len() {
                return Err(ObserverError::IndexOutOfRange {
                    index: range.end.max(range.start),
                    len: items.len(),
                });
            }
            items[range].sort_by(|a, b| compare(&a.node, &b.node));
        }
        self.inner.emit_change();
        Ok(())
    }

    /// Binary search over a list sorted consistently with `f`.
    pub fn binary_search_by(&self, mut f: impl FnMut(&V) -> Ordering) -> Result<usize, usize> {
        self.inner.items.read().binary_search_by(|slot| f(&slot.node))
    }

    /// Fired with each item entering the list.
    pub fn item_added(&self) -> &Signal<V> {
        &self.inner.item_added
    }

    /// Fired with each item leaving the list.
    pub fn item_removed(&self) -> &Signal<V> {
        &self.inner.item_removed
    }

    /// Fired with an item whenever that item reports a change.
    pub fn item_changed(&self) -> &Signal<V> {
        &self.inner.item_changed
    }

    /// True if both handles refer to the same list.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn evicted(&self, slots: Vec<Slot<V>>) {
        for slot in &slots {
            slot.release();
        }
        for slot in &slots {
            self.inner.item_removed.emit(&slot.node);
        }
        self.inner.emit_change();
    }
}

impl<V: NodeHandle + Ord> ObservableList<V> {
    /// Sort by `V`'s ordering, then emit the change signal.
    pub fn sort(&self) {
        self.sort_by(Ord::cmp);
    }
}

impl<V: NodeHandle> Clone for ObservableList<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: NodeHandle> Default for ObservableList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: NodeHandle> FromIterator<V> for ObservableList<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_items(iter)
    }
}

impl<V: NodeHandle> ReactiveNode for ObservableList<V> {
    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.inner.change
    }
}

impl<V: NodeHandle> fmt::Debug for ObservableList<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .finish()
    }
}
