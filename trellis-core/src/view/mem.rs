//! In-memory output tree.
//!
//! `MemNode` is a minimal retained tree with parent links. A node is
//! connected when walking its parents reaches a root created with
//! [`MemNode::root`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::node::{View, ViewNode};

/// Counter for generating unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What a [`MemNode`] represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemKind {
    /// The top of a live tree.
    Root,
    /// A named element.
    Element(String),
    /// A text leaf.
    Text,
    /// A grouping node produced for list results.
    Fragment,
}

struct NodeData {
    id: u64,
    kind: MemKind,
    text: RefCell<String>,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<MemNode>>,
}

/// Handle to a node in an in-memory tree.
#[derive(Clone)]
pub struct MemNode(Rc<NodeData>);

impl MemNode {
    fn with_kind(kind: MemKind, text: &str) -> Self {
        Self(Rc::new(NodeData {
            id: NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            kind,
            text: RefCell::new(text.to_string()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        }))
    }

    /// Create a live root. Everything attached below it is connected.
    pub fn root() -> Self {
        Self::with_kind(MemKind::Root, "")
    }

    /// Create a detached element.
    pub fn element(tag: &str) -> Self {
        Self::with_kind(MemKind::Element(tag.to_string()), "")
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &MemKind {
        &self.0.kind
    }

    pub fn parent(&self) -> Option<MemNode> {
        self.0.parent.borrow().upgrade().map(MemNode)
    }

    pub fn children(&self) -> Vec<MemNode> {
        self.0.children.borrow().clone()
    }

    /// Concatenated text of this node and all descendants.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            MemKind::Text => self.0.text.borrow().clone(),
            _ => self
                .0
                .children
                .borrow()
                .iter()
                .map(MemNode::text_content)
                .collect(),
        }
    }

    /// Replace the content of a text leaf. Ignored for other kinds.
    pub fn set_text(&self, content: &str) {
        if self.0.kind == MemKind::Text {
            *self.0.text.borrow_mut() = content.to_string();
        }
    }

    fn detach(&self) {
        let parent = self.0.parent.replace(Weak::new()).upgrade();
        if let Some(parent) = parent {
            parent
                .children
                .borrow_mut()
                .retain(|child| !Rc::ptr_eq(&child.0, &self.0));
        }
    }

    fn adopt(&self, child: &MemNode) {
        child.detach();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.clone());
    }
}

impl ViewNode for MemNode {
    fn text(content: &str) -> Self {
        Self::with_kind(MemKind::Text, content)
    }

    fn fragment() -> Self {
        Self::with_kind(MemKind::Fragment, "")
    }

    fn append_children(&self, children: &[Self]) {
        for child in children {
            self.adopt(child);
        }
    }

    fn replace_children(&self, children: &[Self]) {
        let old = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in &old {
            *child.0.parent.borrow_mut() = Weak::new();
        }
        self.append_children(children);
    }

    fn remove(&self) {
        self.detach();
    }

    fn replace_with(&self, replacement: &Self) {
        let Some(parent) = self.0.parent.borrow().upgrade() else {
            return;
        };
        replacement.detach();
        let mut children = parent.children.borrow_mut();
        if let Some(slot) = children.iter_mut().find(|c| Rc::ptr_eq(&c.0, &self.0)) {
            *slot = replacement.clone();
            *replacement.0.parent.borrow_mut() = Rc::downgrade(&parent);
            *self.0.parent.borrow_mut() = Weak::new();
        }
    }

    fn is_connected(&self) -> bool {
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if node.0.kind == MemKind::Root {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<MemNode> for View<MemNode> {
    fn from(node: MemNode) -> Self {
        View::Node(node)
    }
}

impl fmt::Debug for MemNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemNode")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
