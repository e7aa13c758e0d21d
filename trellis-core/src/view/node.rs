//! View node capability and view result types.

use std::fmt::Display;
use std::rc::Rc;

use crate::reactive::{Scope, Signal};

/// A node in some output tree.
///
/// Handles are cheap to clone and compare by identity through
/// [`same_node`](ViewNode::same_node).
pub trait ViewNode: Clone + 'static {
    /// Create a detached leaf node holding `content`.
    fn text(content: &str) -> Self;

    /// Create a detached grouping node.
    fn fragment() -> Self;

    /// Append `children` in order, detaching each from its current parent.
    fn append_children(&self, children: &[Self]);

    /// Drop all current children and append `children`.
    fn replace_children(&self, children: &[Self]);

    /// Detach this node from its parent.
    fn remove(&self);

    /// Put `replacement` where this node sits in its parent.
    fn replace_with(&self, replacement: &Self);

    /// Whether this node is part of the live output tree.
    fn is_connected(&self) -> bool;

    /// Identity comparison.
    fn same_node(&self, other: &Self) -> bool;
}

/// Result of a bound computation.
#[derive(Clone)]
pub enum View<N> {
    /// An existing node, used as is.
    Node(N),
    /// Text, rendered as a leaf node.
    Text(String),
    /// Several views, grouped under a fresh fragment.
    List(Vec<View<N>>),
    /// Nothing; rendered as an empty leaf so the binding keeps an anchor.
    Empty,
}

impl<N: ViewNode> View<N> {
    pub fn node(node: N) -> Self {
        Self::Node(node)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Turn the view into a single node.
    pub(crate) fn materialize(self) -> N {
        match self {
            View::Node(node) => node,
            View::Text(text) => N::text(&text),
            View::Empty => N::text(""),
            View::List(items) => {
                let fragment = N::fragment();
                let mut children = Vec::with_capacity(items.len());
                flatten_into(items, &mut children);
                fragment.append_children(&children);
                fragment
            }
        }
    }
}

fn flatten_into<N: ViewNode>(items: Vec<View<N>>, out: &mut Vec<N>) {
    for item in items {
        match item {
            View::List(nested) => flatten_into(nested, out),
            other => out.push(other.materialize()),
        }
    }
}

impl<N> From<String> for View<N> {
    fn from(text: String) -> Self {
        View::Text(text)
    }
}

impl<N> From<&str> for View<N> {
    fn from(text: &str) -> Self {
        View::Text(text.to_string())
    }
}

impl<N> From<Vec<View<N>>> for View<N> {
    fn from(items: Vec<View<N>>) -> Self {
        View::List(items)
    }
}

impl<N, V: Into<View<N>>> From<Option<V>> for View<N> {
    fn from(value: Option<V>) -> Self {
        value.map_or(View::Empty, Into::into)
    }
}

pub(crate) type BoundView<N> = Rc<dyn Fn(&Scope<'_>) -> View<N>>;

fn bound_view<N, F>(view: F) -> BoundView<N>
where
    F: Fn(&Scope<'_>) -> View<N> + 'static,
{
    Rc::new(view)
}

/// A child handed to [`Runtime::append`](crate::reactive::Runtime::append).
pub enum Child<N> {
    /// A static node.
    Node(N),
    /// Static text.
    Text(String),
    /// A computation, bound on append.
    Bound(BoundView<N>),
}

impl<N: ViewNode> Child<N> {
    pub fn node(node: N) -> Self {
        Self::Node(node)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// A child that re-renders whenever the signals read by `view` change.
    pub fn bound<V, F>(view: F) -> Self
    where
        V: Into<View<N>>,
        F: Fn(&Scope<'_>) -> V + 'static,
    {
        Self::Bound(bound_view(move |cx| view(cx).into()))
    }

    /// A text child that tracks `signal`.
    pub fn signal<T>(signal: &Signal<T>) -> Self
    where
        T: Clone + PartialEq + Display + 'static,
    {
        let signal = signal.clone();
        Self::bound(move |cx| signal.with(cx, |value| value.to_string()))
    }
}

impl<N> From<&str> for Child<N> {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl<N> From<String> for Child<N> {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}
