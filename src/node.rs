use crate::signal::{ChangeSignal, SubscriptionId, WeakSignal};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a reactive node.
///
/// Containers compare items by `NodeId`, so two handles to the same cell are
/// "equal" and two cells holding equal values are not.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An object that takes part in change propagation.
///
/// Whatever mutation a node supports, it ends by emitting its
/// [`change_signal`](ReactiveNode::change_signal) with its own id. Parents
/// subscribe to that signal, either through [`Wiring`] or, for containers,
/// per stored item.
pub trait ReactiveNode {
    /// Identity of this node.
    fn node_id(&self) -> NodeId;

    /// Signal emitted after every mutation of this node or of a wired child.
    fn change_signal(&self) -> &ChangeSignal;
}

impl<N: ReactiveNode + ?Sized> ReactiveNode for Arc<N> {
    fn node_id(&self) -> NodeId {
        (**self).node_id()
    }

    fn change_signal(&self) -> &ChangeSignal {
        (**self).change_signal()
    }
}

/// A reactive node that can be stored in a container: a cheap, shareable
/// handle usable from any thread.
pub trait NodeHandle: ReactiveNode + Clone + Send + Sync + 'static {}

impl<T: ReactiveNode + Clone + Send + Sync + 'static> NodeHandle for T {}

struct Link {
    child: NodeId,
    signal: WeakSignal<NodeId>,
    subscription: SubscriptionId,
}

/// Explicit parent/child registration for composite nodes.
///
/// A composite builds one `Wiring` in its constructor, naming each reactive
/// member. Every child change re-emits the parent's change signal with the
/// parent's id. The set of children is fixed at that point: replacing a member
/// afterwards leaves the old link in place until it is [detached](Wiring::detach).
///
/// Dropping the wiring removes every link.
///
/// ```ignore
/// let wiring = Wiring::new(id, &change)
///     .child(&current_hp)
///     .child(&attributes);
/// ```
pub struct Wiring {
    parent: NodeId,
    parent_signal: WeakSignal<NodeId>,
    links: Vec<Link>,
}

impl Wiring {
    /// Start wiring children into the node `parent` whose change signal is `signal`.
    pub fn new(parent: NodeId, signal: &ChangeSignal) -> Self {
        Self {
            parent,
            parent_signal: signal.downgrade(),
            links: Vec::new(),
        }
    }

    /// Builder form of [`attach`](Wiring::attach).
    pub fn child<N: ReactiveNode + ?Sized>(mut self, child: &N) -> Self {
        self.attach(child);
        self
    }

    /// Forward `child`'s changes to the parent.
    ///
    /// # Panics
    /// If `child` is the parent itself; the resulting loop would re-emit until
    /// the nesting limit on every change.
    pub fn attach<N: ReactiveNode + ?Sized>(&mut self, child: &N) {
        let child_id = child.node_id();
        assert_ne!(
            child_id, self.parent,
            "reactive node {child_id} cannot be wired as its own child"
        );

        let parent = self.parent;
        let parent_signal = self.parent_signal.clone();
        let subscription = child.change_signal().subscribe(move |_| {
            if let Some(signal) = parent_signal.upgrade() {
                signal.emit(&parent);
            }
        });
        self.links.push(Link {
            child: child_id,
            signal: child.change_signal().downgrade(),
            subscription,
        });
    }

    /// Remove every link to `child`. Returns `false` if none existed.
    pub fn detach(&mut self, child: NodeId) -> bool {
        let before = self.links.len();
        self.links.retain(|link| {
            if link.child != child {
                return true;
            }
            unlink(link);
            false
        });
        self.links.len() != before
    }

    /// Children currently wired, in registration order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.links.iter().map(|link| link.child)
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True if no child is wired.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

fn unlink(link: &Link) {
    if let Some(signal) = link.signal.upgrade() {
        signal.unsubscribe(link.subscription);
    }
}

impl Drop for Wiring {
    fn drop(&mut self) {
        for link in &self.links {
            unlink(link);
        }
    }
}

impl fmt::Debug for Wiring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wiring")
            .field("parent", &self.parent)
            .field("children", &self.children().collect::<Vec<_>>())
            .finish()
    }
}
