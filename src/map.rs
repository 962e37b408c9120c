use crate::error::ObserverError;
use crate::hash::{FastIndexMap, new_index_map};
use crate::node::{NodeHandle, NodeId, ReactiveNode};
use crate::signal::{ChangeSignal, Signal, SubscriptionId};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// Requirements on map keys.
pub trait MapKey: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static {}

impl<K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static> MapKey for K {}

struct Slot<V> {
    node: V,
    subscription: SubscriptionId,
}

impl<V: NodeHandle> Slot<V> {
    fn release(&self) {
        self.node.change_signal().unsubscribe(self.subscription);
    }
}

struct MapInner<K: MapKey, V: NodeHandle> {
    id: NodeId,
    entries: RwLock<FastIndexMap<K, Slot<V>>>,
    item_added: Signal<(K, V)>,
    item_removed: Signal<(K, V)>,
    item_changed: Signal<(K, V)>,
    change: ChangeSignal,
}

impl<K: MapKey, V: NodeHandle> MapInner<K, V> {
    fn watch(self: &Arc<Self>, key: K, node: V) -> Slot<V> {
        let map: Weak<Self> = Arc::downgrade(self);
        let item = node.node_id();
        let subscription = node.change_signal().subscribe(move |_| {
            if let Some(map) = map.upgrade() {
                map.item_did_change(&key, item);
            }
        });
        Slot { node, subscription }
    }

    fn item_did_change(&self, key: &K, item: NodeId) {
        let node = self
            .entries
            .read()
            .get(key)
            .filter(|slot| slot.node.node_id() == item)
            .map(|slot| slot.node.clone());

        if let Some(node) = node {
            self.item_changed.emit(&(key.clone(), node));
            self.emit_change();
        }
    }

    fn emit_change(&self) {
        self.change.emit(&self.id);
    }
}

impl<K: MapKey, V: NodeHandle> Drop for MapInner<K, V> {
    fn drop(&mut self) {
        for slot in self.entries.get_mut().values() {
            slot.release();
        }
    }
}

/// Key-unique mapping of reactive nodes with per-entry and aggregate signals.
///
/// Entries keep insertion order; [`clear`](Self::clear) and the snapshot
/// accessors follow it. Item signals carry `(key, value)` and always fire
/// before the aggregate change signal of the same call.
///
/// A missing key reads as `None`; nothing is materialised on a miss except
/// through [`get_or_insert_with`](Self::get_or_insert_with).
///
/// # Example
/// ```ignore
/// let stats: ObservableMap<String, Observable<i32>> = ObservableMap::new();
/// stats.item_added().subscribe(|(k, _)| println!("new stat {k}"));
///
/// stats.insert("HP".into(), Observable::new(100))?;        // fires
/// assert!(stats.insert("HP".into(), Observable::new(1)).is_err());
/// stats.get("HP").unwrap().set(90);                         // item_changed + change
/// ```
pub struct ObservableMap<K: MapKey, V: NodeHandle> {
    inner: Arc<MapInner<K, V>>,
}

impl<K: MapKey, V: NodeHandle> ObservableMap<K, V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MapInner {
                id: NodeId::next(),
                entries: RwLock::new(new_index_map()),
                item_added: Signal::new(),
                item_removed: Signal::new(),
                item_changed: Signal::new(),
                change: Signal::new(),
            }),
        }
    }

    /// Create a map from `entries` without emitting anything.
    ///
    /// Fails with [`ObserverError::DuplicateKey`] if a key repeats.
    pub fn from_entries(entries: impl IntoIterator<Item = (K, V)>) -> Result<Self, ObserverError> {
        let map = Self::new();
        {
            let mut storage = map.inner.entries.write();
            for (key, node) in entries {
                if storage.contains_key(&key) {
                    return Err(ObserverError::duplicate_key(&key));
                }
                let slot = map.inner.watch(key.clone(), node);
                storage.insert(key, slot);
            }
        }
        Ok(map)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// True if the map has no entry.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// True if `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.entries.read().contains_key(key)
    }

    /// Value stored under `key`, or `None`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .entries
            .read()
            .get(key)
            .map(|slot| slot.node.clone())
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.inner.entries.read().keys().cloned().collect()
    }

    /// Values in insertion order.
    pub fn values(&self) -> Vec<V> {
        self.inner
            .entries
            .read()
            .values()
            .map(|slot| slot.node.clone())
            .collect()
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.node.clone()))
            .collect()
    }

    /// Add a new entry.
    ///
    /// An existing key fails with [`ObserverError::DuplicateKey`]; the map is
    /// unchanged and nothing is emitted.
    pub fn insert(&self, key: K, value: V) -> Result<(), ObserverError> {
        {
            let mut entries = self.inner.entries.write();
            if entries.contains_key(&key) {
                return Err(ObserverError::duplicate_key(&key));
            }
            let slot = self.inner.watch(key.clone(), value.clone());
            entries.insert(key.clone(), slot);
        }

        self.inner.item_added.emit(&(key, value));
        self.inner.emit_change();
        Ok(())
    }

    /// Store `value` under `key`, adding or replacing.
    ///
    /// - absent key: `item_added`, then change;
    /// - present with another node: the old node is released, the new one
    ///   watched, then `item_changed` and change;
    /// - present with the same node: nothing, returns `false`.
    pub fn set(&self, key: K, value: V) -> bool {
        let replaced = {
            let mut entries = self.inner.entries.write();
            match entries.get_mut(&key) {
                Some(current) if current.node.node_id() == value.node_id() => return false,
                Some(current) => {
                    let slot = self.inner.watch(key.clone(), value.clone());
                    Some(std::mem::replace(current, slot))
                }
                None => {
                    let slot = self.inner.watch(key.clone(), value.clone());
                    entries.insert(key.clone(), slot);
                    None
                }
            }
        };

        match replaced {
            Some(old) => {
                old.release();
                self.inner.item_changed.emit(&(key, value));
            }
            None => {
                self.inner.item_added.emit(&(key, value));
            }
        }
        self.inner.emit_change();
        true
    }

    /// Value under `key`, created with `factory` and added if missing.
    ///
    /// `factory` runs at most once and only on a miss; the insertion emits
    /// `item_added` and change before the value is returned.
    pub fn get_or_insert_with(&self, key: K, factory: impl FnOnce() -> V) -> V {
        if let Some(existing) = self.get(&key) {
            return existing;
        }

        let value = factory();
        {
            let mut entries = self.inner.entries.write();
            // A listener on another handle may have filled the key meanwhile.
            if let Some(slot) = entries.get(&key) {
                return slot.node.clone();
            }
            let slot = self.inner.watch(key.clone(), value.clone());
            entries.insert(key.clone(), slot);
        }

        self.inner.item_added.emit(&(key, value.clone()));
        self.inner.emit_change();
        value
    }

    /// Remove `key`, returning its value. Emits only if the key existed.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (key, slot) = self.inner.entries.write().shift_remove_entry(key)?;
        slot.release();

        let node = slot.node.clone();
        self.inner.item_removed.emit(&(key, slot.node));
        self.inner.emit_change();
        Some(node)
    }

    /// Remove `key` only if it currently stores `value`.
    pub fn remove_entry(&self, key: &K, value: &V) -> bool {
        let removed = {
            let mut entries = self.inner.entries.write();
            let stored = entries
                .get(key)
                .is_some_and(|slot| slot.node.node_id() == value.node_id());
            if stored {
                entries.shift_remove_entry(key)
            } else {
                None
            }
        };

        let Some((key, slot)) = removed else {
            return false;
        };
        slot.release();
        self.inner.item_removed.emit(&(key, slot.node));
        self.inner.emit_change();
        true
    }

    /// Remove every entry.
    ///
    /// Storage is emptied first, then one `item_removed` fires per former
    /// entry in insertion order, then one change. An empty map still emits
    /// the change.
    pub fn clear(&self) {
        let drained: Vec<(K, Slot<V>)> = {
            let mut entries = self.inner.entries.write();
            entries.drain(..).collect()
        };

        for (_, slot) in &drained {
            slot.release();
        }
        for (key, slot) in drained {
            self.inner.item_removed.emit(&(key, slot.node));
        }
        self.inner.emit_change();
    }

    /// Clear, then insert each of `entries` individually.
    ///
    /// Stops at the first duplicate key among `entries`.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<(), ObserverError> {
        self.clear();
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Fired with each entry entering the map.
    pub fn item_added(&self) -> &Signal<(K, V)> {
        &self.inner.item_added
    }

    /// Fired with each entry leaving the map.
    pub fn item_removed(&self) -> &Signal<(K, V)> {
        &self.inner.item_removed
    }

    /// Fired when an entry's value is replaced or reports a change.
    pub fn item_changed(&self) -> &Signal<(K, V)> {
        &self.inner.item_changed
    }

    /// True if both handles refer to the same map.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<K: MapKey, V: NodeHandle> Clone for ObservableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: MapKey, V: NodeHandle> Default for ObservableMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: MapKey, V: NodeHandle> ReactiveNode for ObservableMap<K, V> {
    fn node_id(&self) -> NodeId {
        self.inner.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.inner.change
    }
}

impl<K: MapKey, V: NodeHandle> fmt::Debug for ObservableMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableMap")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observable;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Stats = ObservableMap<String, Observable<i32>>;

    fn watch(map: &Stats) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = log.clone();
            map.item_added()
                .subscribe(move |(k, v)| log.lock().push(format!("+{k}={}", v.get())));
        }
        {
            let log = log.clone();
            map.item_removed()
                .subscribe(move |(k, v)| log.lock().push(format!("-{k}={}", v.get())));
        }
        {
            let log = log.clone();
            map.item_changed()
                .subscribe(move |(k, v)| log.lock().push(format!("~{k}={}", v.get())));
        }
        {
            let log = log.clone();
            map.change_signal().subscribe(move |_| log.lock().push("changed".into()));
        }
        log
    }

    #[test]
    fn duplicate_insert_is_rejected_without_signals() {
        let map = Stats::new();
        let log = watch(&map);

        map.insert("HP".into(), Observable::new(1)).unwrap();
        let err = map.insert("HP".into(), Observable::new(2)).unwrap_err();

        assert_eq!(
            err,
            ObserverError::DuplicateKey {
                key: "\"HP\"".into()
            }
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("HP").map(|v| v.get()), Some(1));
        assert_eq!(*log.lock(), ["+HP=1", "changed"]);
    }

    #[test]
    fn set_adds_replaces_or_ignores() {
        let map = Stats::new();
        let log = watch(&map);
        let first = Observable::new(1);
        let second = Observable::new(2);

        assert!(map.set("a".into(), first.clone()));
        assert!(!map.set("a".into(), first.clone()));
        assert!(map.set("a".into(), second.clone()));

        first.set(10);
        second.set(20);

        assert_eq!(
            *log.lock(),
            ["+a=1", "changed", "~a=2", "changed", "~a=20", "changed"]
        );
        assert_eq!(first.change_signal().listener_count(), 0);
    }

    #[test]
    fn missing_key_reads_as_none() {
        let map = Stats::new();
        assert!(map.get("nope").is_none());
        assert!(!map.contains_key("nope"));
        assert!(map.remove("nope").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn get_or_insert_with_runs_factory_once() {
        let map = Stats::new();
        let log = watch(&map);
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            calls.fetch_add(1, Ordering::Relaxed);
            Observable::new(5)
        };
        let a = map.get_or_insert_with("x".into(), make);
        let b = map.get_or_insert_with("x".into(), || {
            calls.fetch_add(1, Ordering::Relaxed);
            Observable::new(6)
        });

        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(*log.lock(), ["+x=5", "changed"]);
    }

    #[test]
    fn remove_emits_only_when_present() {
        let map = Stats::from_entries([("a".to_string(), Observable::new(1))]).unwrap();
        let log = watch(&map);

        let removed = map.remove("a").unwrap();
        assert!(map.remove("a").is_none());
        removed.set(3);

        assert_eq!(*log.lock(), ["-a=1", "changed"]);
    }

    #[test]
    fn remove_entry_requires_the_same_node() {
        let value = Observable::new(1);
        let map = Stats::from_entries([("a".to_string(), value.clone())]).unwrap();

        assert!(!map.remove_entry(&"a".to_string(), &Observable::new(1)));
        assert!(map.remove_entry(&"a".to_string(), &value));
        assert!(map.is_empty());
    }

    #[test]
    fn clear_reports_each_entry_in_insertion_order() {
        let map = Stats::from_entries([
            ("b".to_string(), Observable::new(2)),
            ("a".to_string(), Observable::new(1)),
        ])
        .unwrap();
        let values = map.values();
        let log = watch(&map);

        map.clear();
        map.clear();

        assert_eq!(*log.lock(), ["-b=2", "-a=1", "changed", "changed"]);
        assert!(values.iter().all(|v| v.change_signal().listener_count() == 0));
    }

    #[test]
    fn listener_sees_cleared_storage() {
        let map = Stats::from_entries([("a".to_string(), Observable::new(1))]).unwrap();
        let handle = map.clone();
        let seen_len = Arc::new(AtomicUsize::new(usize::MAX));
        {
            let seen_len = seen_len.clone();
            map.item_removed()
                .subscribe(move |_| seen_len.store(handle.len(), Ordering::Relaxed));
        }

        map.clear();
        assert_eq!(seen_len.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let result = Stats::from_entries([
            ("a".to_string(), Observable::new(1)),
            ("a".to_string(), Observable::new(2)),
        ]);
        assert!(matches!(result, Err(ObserverError::DuplicateKey { .. })));
    }

    #[test]
    fn replace_all_swaps_contents() {
        let map = Stats::from_entries([("a".to_string(), Observable::new(1))]).unwrap();
        map.replace_all([
            ("b".to_string(), Observable::new(2)),
            ("c".to_string(), Observable::new(3)),
        ])
        .unwrap();

        assert_eq!(map.keys(), ["b", "c"]);
        let entries: Vec<_> = map.entries().into_iter().map(|(k, v)| (k, v.get())).collect();
        assert_eq!(entries, [("b".to_string(), 2), ("c".to_string(), 3)]);
    }
}
