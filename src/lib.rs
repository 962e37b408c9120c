#![deny(missing_docs)]

//! Synchronous observable values, lists and maps for game-state data binding.
//!
//! Every observable is a *reactive node*: it owns a change signal and emits it
//! after each effective mutation. Composite objects register their reactive
//! members explicitly, and containers subscribe to the items they hold, so a
//! change anywhere in an ownership tree bubbles up to the root. UI code
//! listens at whatever level it cares about and re-reads the values it needs.
//!
//! # Quick Start
//!
//! ```ignore
//! use observer::{Observable, ObservableMap, ReactiveNode, UnitAttributes};
//!
//! let unit = UnitAttributes::with_health(100.0, 100);
//! unit.change_signal().subscribe(|_| println!("unit changed"));
//!
//! unit.current_hp().set(80.0);   // prints once
//! unit.current_hp().set(80.0);   // equal value, nothing fires
//! ```
//!
//! # Core Types
//!
//! - [`Signal`] - ordered listener list; [`ChangeSignal`] is the bubbling kind.
//! - [`Observable<T>`] - scalar cell, emits only when the value differs.
//! - [`ObservableList<V>`] - ordered items with add/remove/change signals.
//! - [`ObservableMap<K, V>`] - key-unique entries with add/remove/change signals.
//! - [`Wiring`] - explicit child registration for composite nodes.
//!
//! # Ordering
//!
//! All emission is synchronous: when a mutator returns, every signal it
//! triggered has fired. Listeners of one signal run in registration order and
//! item-level signals fire before the aggregate change signal of the same call.
//!
//! # Re-entrancy
//!
//! Listeners may mutate the node that notified them. Each signal counts its
//! nested emissions and drops (with a `tracing` warning) any emission nested
//! deeper than [`DEFAULT_MAX_EMIT_DEPTH`], or the limit given to
//! [`Signal::with_max_depth`].
//!
//! # Domain types
//!
//! ```ignore
//! // Fixed unit stats with typed accessors
//! let max = unit.max_hp()?;                       // Observable<i32>
//! let err = unit.attribute::<f32>("HP");          // Err(TypeMismatch)
//!
//! // Runtime-shaped data
//! let tree = DataTree::from_json(r#"{ "stats": { "hp": 120 } }"#)?;
//! let hp = tree.subtree("stats")?.child::<i64>("hp")?;
//! ```

mod error;
mod hash;
mod health_bar;
mod list;
mod map;
mod node;
mod signal;
mod tree;
mod unit;
mod untyped;
mod value;

// Core types
pub use list::ObservableList;
pub use map::{MapKey, ObservableMap};
pub use node::{NodeHandle, NodeId, ReactiveNode, Wiring};
pub use signal::{ChangeSignal, DEFAULT_MAX_EMIT_DEPTH, Signal, SubscriptionId, WeakSignal};
pub use value::Observable;

// Errors
pub use error::{AttributeError, AttributeKind, DataTreeError, ObserverError};

// Untyped access
pub use untyped::{UntypedList, UntypedMap};

// Domain models
pub use health_bar::{HealthBar, HealthBarState};
pub use tree::{DataLeaf, DataNode, DataTree};
pub use unit::{Attribute, AttributeCell, AttributeValue, UnitAttributes};
