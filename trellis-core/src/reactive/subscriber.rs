//! Subscription entries stored on signals.
//!
//! A signal keeps two lists: bindings (computations that render view nodes)
//! and listeners (computations that feed derived signals). Both are stored
//! type-erased behind [`Subscription`] so a signal does not need to know the
//! node type or the derived value type of its dependents.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::runtime::Runtime;
use crate::view::ViewNode;

/// Unique identifier for a subscription entry.
///
/// Every (re-)invocation of a bound or derived computation creates a new
/// entry with a fresh ID. Flushes deduplicate entries by this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Liveness check for an anchor node, erased over the node type.
pub(crate) trait Connected {
    fn is_connected(&self) -> bool;
}

impl<N: ViewNode> Connected for N {
    fn is_connected(&self) -> bool {
        ViewNode::is_connected(self)
    }
}

/// The node a listener's lifetime is tied to.
#[derive(Clone)]
pub(crate) enum Anchor {
    /// Always connected. Derivations created outside any view use this and
    /// are never collected.
    Root,
    /// Alive while the node is part of the live output tree.
    Node(Rc<dyn Connected>),
}

impl Anchor {
    pub fn node<N: ViewNode>(node: &N) -> Self {
        Anchor::Node(Rc::new(node.clone()))
    }

    pub fn is_live(&self) -> bool {
        match self {
            Anchor::Root => true,
            Anchor::Node(node) => node.is_connected(),
        }
    }
}

/// Anchor slot of a listener. `None` while unresolved and after retirement.
pub(crate) type AnchorCell = RefCell<Option<Anchor>>;

/// Listener anchors collected while a binding runs; resolved to the
/// binding's node once it exists.
pub(crate) type NestedListeners = RefCell<Vec<Rc<AnchorCell>>>;

/// A bound or derived computation subscribed to one or more signals.
pub(crate) trait Subscription {
    fn id(&self) -> SubscriptionId;

    /// Whether the entry's anchor is still part of the live tree.
    fn is_live(&self) -> bool;

    /// Re-run the computation as a fresh entry and retire this one.
    fn rerun(self: Rc<Self>, runtime: &Runtime);
}

pub(crate) type Entries = SmallVec<[Rc<dyn Subscription>; 2]>;

/// Which list of a signal an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriberKind {
    View,
    Listener,
}

/// The two subscriber lists of a signal.
#[derive(Default)]
pub(crate) struct Subscribers {
    pub views: Entries,
    pub listeners: Entries,
}

impl Subscribers {
    pub fn len(&self) -> usize {
        self.views.len() + self.listeners.len()
    }

    pub fn list_mut(&mut self, kind: SubscriberKind) -> &mut Entries {
        match kind {
            SubscriberKind::View => &mut self.views,
            SubscriberKind::Listener => &mut self.listeners,
        }
    }

    /// Drop dead entries from both lists. Returns how many were removed.
    pub fn retain_live(&mut self) -> usize {
        let before = self.len();
        self.views.retain(|entry| entry.is_live());
        self.listeners.retain(|entry| entry.is_live());
        before - self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::MemNode;

    #[test]
    fn subscription_ids_are_unique() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        let id3 = SubscriptionId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn root_anchor_is_always_live() {
        assert!(Anchor::Root.is_live());
    }

    #[test]
    fn node_anchor_follows_connectivity() {
        let root = MemNode::root();
        let node = MemNode::element("p");
        let anchor = Anchor::node(&node);
        assert!(!anchor.is_live());

        root.append_children(&[node.clone()]);
        assert!(anchor.is_live());

        node.remove();
        assert!(!anchor.is_live());
    }
}
