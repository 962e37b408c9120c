//! String-keyed tree of observable values for data whose shape is only known
//! at runtime (server-provided configuration, save games).
//!
//! Leaves are type-erased [`Observable`]s, so reads name the expected type and
//! a wrong guess is an explicit [`DataTreeError::TypeMismatch`]. Changes to any
//! leaf or subtree bubble to the root.

use crate::error::DataTreeError;
use crate::map::ObservableMap;
use crate::node::{NodeId, ReactiveNode, Wiring};
use crate::signal::{ChangeSignal, Signal};
use crate::value::Observable;
use serde_json::{Map, Value};
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// A type-erased [`Observable`].
#[derive(Clone)]
pub struct DataLeaf {
    id: NodeId,
    change: ChangeSignal,
    observable: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl DataLeaf {
    /// Leaf holding a fresh observable seeded with `value`.
    pub fn new<T>(value: T) -> Self
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Self::from_observable(Observable::new(value))
    }

    /// Leaf sharing an existing observable.
    pub fn from_observable<T>(observable: Observable<T>) -> Self
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Self {
            id: observable.node_id(),
            change: observable.change_signal().clone(),
            type_name: type_name::<T>(),
            observable: Arc::new(observable),
        }
    }

    /// The stored observable, if it holds a `T`.
    pub fn observable<T: 'static>(&self) -> Option<Observable<T>> {
        self.observable.downcast_ref::<Observable<T>>().cloned()
    }

    /// Name of the stored value type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl ReactiveNode for DataLeaf {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.change
    }
}

impl fmt::Debug for DataLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLeaf")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .finish()
    }
}

/// A child of a [`DataTree`].
#[derive(Clone, Debug)]
pub enum DataNode {
    /// Nested tree.
    Tree(Arc<DataTree>),
    /// Single value.
    Leaf(DataLeaf),
}

impl ReactiveNode for DataNode {
    fn node_id(&self) -> NodeId {
        match self {
            DataNode::Tree(tree) => tree.node_id(),
            DataNode::Leaf(leaf) => leaf.node_id(),
        }
    }

    fn change_signal(&self) -> &ChangeSignal {
        match self {
            DataNode::Tree(tree) => tree.change_signal(),
            DataNode::Leaf(leaf) => leaf.change_signal(),
        }
    }
}

/// Named children, each a value or a nested tree.
pub struct DataTree {
    id: NodeId,
    change: ChangeSignal,
    children: ObservableMap<String, DataNode>,
    _wiring: Wiring,
}

impl DataTree {
    /// Empty tree.
    pub fn new() -> Self {
        let id = NodeId::next();
        let change = Signal::new();
        let children = ObservableMap::new();
        let wiring = Wiring::new(id, &change).child(&children);
        Self {
            id,
            change,
            children,
            _wiring: wiring,
        }
    }

    /// Build a tree from a JSON object. See [`fill_from_json`](Self::fill_from_json).
    pub fn from_json(json: &str) -> Result<Self, DataTreeError> {
        let tree = Self::new();
        tree.fill_from_json(json)?;
        Ok(tree)
    }

    /// Merge a JSON object into this tree.
    ///
    /// Objects become subtrees (merged into existing ones), booleans `bool`
    /// leaves, integers `i64`, other numbers `f64`, strings `String`. Existing
    /// leaves are set in place and must hold the same type. `null` is skipped
    /// and arrays are rejected. On error the tree keeps whatever was merged
    /// before the failing value.
    pub fn fill_from_json(&self, json: &str) -> Result<(), DataTreeError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(object) => self.fill_object(&object, "$"),
            _ => Err(DataTreeError::UnsupportedJson { path: "$".into() }),
        }
    }

    fn fill_object(&self, object: &Map<String, Value>, path: &str) -> Result<(), DataTreeError> {
        for (key, value) in object {
            let path = format!("{path}.{key}");
            match value {
                Value::Object(nested) => {
                    let subtree = match self.subtree(key) {
                        Ok(subtree) => subtree,
                        Err(DataTreeError::Missing { .. }) => {
                            self.add_node(key.clone(), DataTree::new())?
                        }
                        Err(err) => return Err(err),
                    };
                    subtree.fill_object(nested, &path)?;
                }
                Value::Bool(flag) => self.set_child(key.clone(), *flag)?,
                Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                    (Some(int), _) => self.set_child(key.clone(), int)?,
                    (None, Some(float)) => self.set_child(key.clone(), float)?,
                    (None, None) => return Err(DataTreeError::UnsupportedJson { path }),
                },
                Value::String(text) => self.set_child(key.clone(), text.clone())?,
                Value::Null => tracing::debug!(%path, "skipping null value"),
                Value::Array(_) => return Err(DataTreeError::UnsupportedJson { path }),
            }
        }
        Ok(())
    }

    /// Add `tree` under `key`, returning the shared subtree.
    pub fn add_node(&self, key: impl Into<String>, tree: DataTree) -> Result<Arc<DataTree>, DataTreeError> {
        let key = key.into();
        let tree = Arc::new(tree);
        self.children
            .insert(key.clone(), DataNode::Tree(tree.clone()))
            .map_err(|_| DataTreeError::DuplicateKey { key })?;
        Ok(tree)
    }

    /// Set the value under `key`, creating the leaf if needed.
    pub fn set_child<T>(&self, key: impl Into<String>, value: T) -> Result<(), DataTreeError>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let key = key.into();
        match self.children.get(&key) {
            None => {
                let leaf = DataNode::Leaf(DataLeaf::new(value));
                self.children
                    .insert(key.clone(), leaf)
                    .map_err(|_| DataTreeError::DuplicateKey { key })
            }
            Some(DataNode::Leaf(leaf)) => {
                let observable = typed(&key, &leaf)?;
                observable.set(value);
                Ok(())
            }
            Some(DataNode::Tree(_)) => Err(DataTreeError::NotALeaf { key }),
        }
    }

    /// The observable stored under `key`.
    pub fn child<T: 'static>(&self, key: &str) -> Result<Observable<T>, DataTreeError> {
        match self.children.get(key) {
            Some(DataNode::Leaf(leaf)) => typed(key, &leaf),
            Some(DataNode::Tree(_)) => Err(DataTreeError::NotALeaf { key: key.into() }),
            None => Err(DataTreeError::Missing { key: key.into() }),
        }
    }

    /// The subtree stored under `key`.
    pub fn subtree(&self, key: &str) -> Result<Arc<DataTree>, DataTreeError> {
        match self.children.get(key) {
            Some(DataNode::Tree(tree)) => Ok(tree),
            Some(DataNode::Leaf(_)) => Err(DataTreeError::NotATree { key: key.into() }),
            None => Err(DataTreeError::Missing { key: key.into() }),
        }
    }

    /// Remove `key`; returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.children.remove(key).is_some()
    }

    /// True if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Child names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.children.keys()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if the tree has no child.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

fn typed<T: 'static>(key: &str, leaf: &DataLeaf) -> Result<Observable<T>, DataTreeError> {
    leaf.observable::<T>()
        .ok_or_else(|| DataTreeError::TypeMismatch {
            key: key.into(),
            expected: type_name::<T>(),
            actual: leaf.type_name(),
        })
}

impl Default for DataTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveNode for DataTree {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn change_signal(&self) -> &ChangeSignal {
        &self.change
    }
}

impl fmt::Debug for DataTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTree")
            .field("id", &self.id)
            .field("children", &self.children.keys())
            .finish()
    }
}
