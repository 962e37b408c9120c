//! Object-style access to containers whose element type is not known
//! statically (inspectors, scripting bridges, generic UI bindings).
//!
//! Values travel as `dyn Any`. An argument of the wrong runtime type (on reads
//! as well as writes), a duplicate key or an out-of-range index is reported
//! through `tracing::error!` and the call returns a neutral result. None of
//! these methods panic or return an error.

use crate::list::ObservableList;
use crate::map::{MapKey, ObservableMap};
use crate::node::{NodeHandle, ReactiveNode};
use std::any::{Any, type_name};

/// Untyped view of an [`ObservableList`].
pub trait UntypedList {
    /// Number of items.
    fn untyped_len(&self) -> usize;

    /// Append `value`; returns its index, or `None` if it was rejected or is
    /// no longer in the list.
    fn push_any(&self, value: Box<dyn Any>) -> Option<usize>;

    /// Insert `value` at `index`.
    fn insert_any(&self, index: usize, value: Box<dyn Any>);

    /// Remove the first occurrence of `value`.
    fn remove_any(&self, value: &dyn Any) -> bool;

    /// Overwrite the item at `index`.
    fn set_any(&self, index: usize, value: Box<dyn Any>);

    /// Item at `index`, boxed.
    fn get_any(&self, index: usize) -> Option<Box<dyn Any>>;

    /// Position of `value`; `None` for a value of another type.
    fn index_of_any(&self, value: &dyn Any) -> Option<usize>;

    /// True if `value` is stored.
    fn contains_any(&self, value: &dyn Any) -> bool {
        self.index_of_any(value).is_some()
    }
}

/// Untyped view of an [`ObservableMap`].
pub trait UntypedMap {
    /// Number of entries.
    fn untyped_len(&self) -> usize;

    /// Add a new entry; a duplicate key is logged and ignored.
    fn insert_any(&self, key: Box<dyn Any>, value: Box<dyn Any>);

    /// Add or replace an entry.
    fn set_any(&self, key: Box<dyn Any>, value: Box<dyn Any>);

    /// Remove `key`; returns whether it was present.
    fn remove_any(&self, key: &dyn Any) -> bool;

    /// Value under `key`, boxed.
    fn get_any(&self, key: &dyn Any) -> Option<Box<dyn Any>>;

    /// True if `key` is present.
    fn contains_key_any(&self, key: &dyn Any) -> bool;
}

fn accept<T: 'static>(value: Box<dyn Any>, operation: &'static str) -> Option<T> {
    match value.downcast::<T>() {
        Ok(value) => Some(*value),
        Err(_) => {
            wrong_type::<T>(operation);
            None
        }
    }
}

fn accept_ref<'a, T: 'static>(value: &'a dyn Any, operation: &'static str) -> Option<&'a T> {
    let value = value.downcast_ref::<T>();
    if value.is_none() {
        wrong_type::<T>(operation);
    }
    value
}

// `dyn Any` carries no type name, so only the expected side can be reported.
fn wrong_type<T: 'static>(operation: &'static str) {
    tracing::error!(
        operation,
        expected = type_name::<T>(),
        "rejected argument of the wrong type"
    );
}

impl<V: NodeHandle> UntypedList for ObservableList<V> {
    fn untyped_len(&self) -> usize {
        self.len()
    }

    fn push_any(&self, value: Box<dyn Any>) -> Option<usize> {
        let item = accept::<V>(value, "push")?;
        let id = item.node_id();
        let index = self.append(item);
        if self.get(index).is_some_and(|stored| stored.node_id() == id) {
            return Some(index);
        }
        // A listener reshuffled the list; the newest copy is the last one
        self.to_vec().iter().rposition(|stored| stored.node_id() == id)
    }

    fn insert_any(&self, index: usize, value: Box<dyn Any>) {
        let Some(item) = accept::<V>(value, "insert") else {
            return;
        };
        if let Err(err) = self.insert(index, item) {
            tracing::error!(operation = "insert", %err, "rejected untyped insert");
        }
    }

    fn remove_any(&self, value: &dyn Any) -> bool {
        accept_ref::<V>(value, "remove").is_some_and(|item| self.remove(item))
    }

    fn set_any(&self, index: usize, value: Box<dyn Any>) {
        let Some(item) = accept::<V>(value, "set") else {
            return;
        };
        if let Err(err) = self.set(index, item) {
            tracing::error!(operation = "set", %err, "rejected untyped set");
        }
    }

    fn get_any(&self, index: usize) -> Option<Box<dyn Any>> {
        self.get(index).map(|item| Box::new(item) as Box<dyn Any>)
    }

    fn index_of_any(&self, value: &dyn Any) -> Option<usize> {
        accept_ref::<V>(value, "index_of").and_then(|item| self.index_of(item))
    }
}

impl<K: MapKey, V: NodeHandle> UntypedMap for ObservableMap<K, V> {
    fn untyped_len(&self) -> usize {
        self.len()
    }

    fn insert_any(&self, key: Box<dyn Any>, value: Box<dyn Any>) {
        let (Some(key), Some(value)) = (accept::<K>(key, "insert"), accept::<V>(value, "insert"))
        else {
            return;
        };
        if let Err(err) = self.insert(key, value) {
            tracing::error!(operation = "insert", %err, "rejected untyped insert");
        }
    }

    fn set_any(&self, key: Box<dyn Any>, value: Box<dyn Any>) {
        if let (Some(key), Some(value)) = (accept::<K>(key, "set"), accept::<V>(value, "set")) {
            self.set(key, value);
        }
    }

    fn remove_any(&self, key: &dyn Any) -> bool {
        accept_ref::<K>(key, "remove").is_some_and(|key| self.remove(key).is_some())
    }

    fn get_any(&self, key: &dyn Any) -> Option<Box<dyn Any>> {
        let key = accept_ref::<K>(key, "get")?;
        self.get(key).map(|value| Box::new(value) as Box<dyn Any>)
    }

    fn contains_key_any(&self, key: &dyn Any) -> bool {
        accept_ref::<K>(key, "contains_key").is_some_and(|key| self.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ReactiveNode;
    use crate::{Observable, ObservableList, ObservableMap};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn count_changes(node: &impl ReactiveNode) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        node.change_signal().subscribe(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        count
    }

    #[test]
    fn list_accepts_matching_values() {
        let list: ObservableList<Observable<i32>> = ObservableList::new();
        let item = Observable::new(3);

        assert_eq!(list.push_any(Box::new(item.clone())), Some(0));
        assert_eq!(list.index_of_any(&item), Some(0));
        assert!(list.contains_any(&item));

        let fetched = list.get_any(0).and_then(|b| b.downcast::<Observable<i32>>().ok());
        assert!(fetched.is_some_and(|f| f.ptr_eq(&item)));
        assert!(list.remove_any(&item));
        assert_eq!(list.untyped_len(), 0);
    }

    #[test]
    fn list_ignores_wrong_types_and_bad_indices() {
        let list: ObservableList<Observable<i32>> = ObservableList::new();
        let changes = count_changes(&list);

        assert_eq!(list.push_any(Box::new(Observable::new(1.5f32))), None);
        assert_eq!(list.push_any(Box::new(7)), None);
        list.insert_any(0, Box::new("seven"));
        list.insert_any(4, Box::new(Observable::new(1)));
        list.set_any(0, Box::new(Observable::new(1)));
        assert!(!list.remove_any(&7u8));
        assert_eq!(list.index_of_any(&7u8), None);

        assert_eq!(list.untyped_len(), 0);
        assert_eq!(changes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn map_round_trips_through_any() {
        let map: ObservableMap<String, Observable<f32>> = ObservableMap::new();
        let changes = count_changes(&map);

        map.insert_any(Box::new("speed".to_string()), Box::new(Observable::new(1.0f32)));
        map.insert_any(Box::new("speed".to_string()), Box::new(Observable::new(2.0f32)));
        map.set_any(Box::new("range".to_string()), Box::new(Observable::new(3.0f32)));

        assert!(map.contains_key_any(&"speed".to_string()));
        let speed = map
            .get_any(&"speed".to_string())
            .and_then(|b| b.downcast::<Observable<f32>>().ok())
            .map(|o| o.get());
        assert_eq!(speed, Some(1.0));
        assert!(map.remove_any(&"range".to_string()));
        assert_eq!(map.untyped_len(), 1);
        assert_eq!(changes.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn map_ignores_wrong_types() {
        let map: ObservableMap<String, Observable<f32>> = ObservableMap::new();
        let changes = count_changes(&map);

        map.insert_any(Box::new(1u32), Box::new(Observable::new(1.0f32)));
        map.set_any(Box::new("a".to_string()), Box::new(1.0f32));
        assert!(!map.remove_any(&"a"));
        assert!(!map.contains_key_any(&1u32));
        assert!(map.get_any(&1u32).is_none());

        assert_eq!(map.untyped_len(), 0);
        assert_eq!(changes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn push_reports_the_appended_position() {
        let list: ObservableList<Observable<i32>> = ObservableList::new();
        let item = Observable::new(1);

        assert_eq!(list.push_any(Box::new(item.clone())), Some(0));
        assert_eq!(list.push_any(Box::new(item.clone())), Some(1));
        assert_eq!(list.untyped_len(), 2);
    }

    #[test]
    fn push_follows_an_item_moved_by_a_listener() {
        let list: ObservableList<Observable<i32>> = ObservableList::new();
        list.push(Observable::new(0));
        let handle = list.clone();
        list.item_added().subscribe(move |item| {
            // Move every newcomer to the front
            if handle.index_of(item) != Some(0) && handle.remove(item) {
                let _ = handle.insert(0, item.clone());
            }
        });

        let item = Observable::new(1);
        assert_eq!(list.push_any(Box::new(item.clone())), Some(0));

        let evicting = list.clone();
        list.item_added().subscribe(move |item| {
            evicting.remove(item);
        });
        assert_eq!(list.push_any(Box::new(Observable::new(2))), None);
    }

    #[test]
    fn reads_with_wrong_types_are_neutral() {
        let list: ObservableList<Observable<i32>> = ObservableList::from_items([Observable::new(1)]);
        let map: ObservableMap<String, Observable<f32>> =
            ObservableMap::from_entries([("a".to_string(), Observable::new(1.0f32))]).unwrap();

        assert_eq!(list.index_of_any(&Observable::new(1u8)), None);
        assert!(!list.contains_any(&"a"));
        assert!(map.get_any(&"a").is_none());
        assert!(!map.contains_key_any(&'a'));
        assert!(map.contains_key_any(&"a".to_string()));
    }
}
