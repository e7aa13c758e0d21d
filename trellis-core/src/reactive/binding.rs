//! View Bindings
//!
//! A binding ties a view-producing computation to the node it rendered.
//! When a signal the computation read changes, the scheduler re-runs it in
//! the commit phase of the next flush and splices the new node in place of
//! the old one.

use std::cell::RefCell;
use std::rc::Rc;

use super::context::{Scope, Tracked};
use super::runtime::Runtime;
use super::subscriber::{Anchor, NestedListeners, Subscription, SubscriptionId};
use crate::error::{BoxError, ReactiveError};
use crate::view::{Child, View, ViewNode};

type BindFn<N> = Rc<dyn Fn(&Scope<'_>) -> Result<View<N>, ReactiveError>>;

fn bind_fn<N, F>(compute: F) -> BindFn<N>
where
    F: Fn(&Scope<'_>) -> Result<View<N>, ReactiveError> + 'static,
{
    Rc::new(compute)
}

struct Binding<N> {
    id: SubscriptionId,
    compute: BindFn<N>,
    /// The rendered node; `None` once the binding is retired.
    node: RefCell<Option<N>>,
}

impl<N: ViewNode> Subscription for Binding<N> {
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.node
            .borrow()
            .as_ref()
            .is_some_and(|node| ViewNode::is_connected(node))
    }

    fn rerun(self: Rc<Self>, runtime: &Runtime) {
        let Some(old) = self.node.borrow_mut().take() else {
            return;
        };
        let new = runtime.bind_raw(self.compute.clone(), Some(&old));
        if !new.same_node(&old) {
            old.replace_with(&new);
        }
    }
}

impl Runtime {
    /// Render `compute` into a node and subscribe a fresh binding.
    ///
    /// On failure the binding keeps `existing`, or renders an empty text
    /// node when there is none.
    fn bind_raw<N: ViewNode>(&self, compute: BindFn<N>, existing: Option<&N>) -> N {
        let nested: NestedListeners = RefCell::new(Vec::new());
        let Tracked { value, deps } = Scope::track(self, Some(&nested), |cx| compute(cx));

        let node = match value {
            Some(view) => view.materialize(),
            None => existing.cloned().unwrap_or_else(|| N::text("")),
        };

        let binding: Rc<dyn Subscription> = Rc::new(Binding {
            id: SubscriptionId::new(),
            compute,
            node: RefCell::new(Some(node.clone())),
        });
        deps.subscribe(&self.inner, |subscribers| {
            subscribers.views.push(binding.clone())
        });

        let anchor = Anchor::node(&node);
        for cell in nested.into_inner() {
            *cell.borrow_mut() = Some(anchor.clone());
        }
        node
    }

    /// Render a view that re-renders whenever a signal it read changes.
    ///
    /// The returned node is the current anchor. It is replaced in its
    /// parent on each re-render that produces a different node, so attach
    /// it to the output tree before the next flush.
    pub fn bind<N, V, F>(&self, view: F) -> N
    where
        N: ViewNode,
        V: Into<View<N>>,
        F: Fn(&Scope<'_>) -> V + 'static,
    {
        self.bind_raw(bind_fn(move |cx| Ok(view(cx).into())), None)
    }

    /// Fallible form of [`Runtime::bind`]. A failed render keeps the node
    /// from the previous one.
    pub fn try_bind<N, V, E, F>(&self, view: F) -> N
    where
        N: ViewNode,
        V: Into<View<N>>,
        E: Into<BoxError>,
        F: Fn(&Scope<'_>) -> Result<V, E> + 'static,
    {
        self.bind_raw(
            bind_fn(move |cx| {
                view(cx)
                    .map(Into::into)
                    .map_err(|e| ReactiveError::Computation(e.into()))
            }),
            None,
        )
    }

    /// Append `children` to `parent`, binding the reactive ones. Returns
    /// `parent`.
    pub fn append<N, I>(&self, parent: &N, children: I) -> N
    where
        N: ViewNode,
        I: IntoIterator<Item = Child<N>>,
    {
        let nodes = self.child_nodes(children);
        parent.append_children(&nodes);
        parent.clone()
    }

    /// Replace the children of `parent`. Returns `parent`.
    pub fn set_children<N, I>(&self, parent: &N, children: I) -> N
    where
        N: ViewNode,
        I: IntoIterator<Item = Child<N>>,
    {
        let nodes = self.child_nodes(children);
        parent.replace_children(&nodes);
        parent.clone()
    }

    fn child_nodes<N, I>(&self, children: I) -> Vec<N>
    where
        N: ViewNode,
        I: IntoIterator<Item = Child<N>>,
    {
        children
            .into_iter()
            .map(|child| match child {
                Child::Node(node) => node,
                Child::Text(text) => N::text(&text),
                Child::Bound(view) => self.bind_raw(bind_fn(move |cx| Ok(view(cx))), None),
            })
            .collect()
    }
}
