//! Derived Signals
//!
//! A derivation feeds a target signal from a computation over other
//! signals. Each run is a [`Listener`] entry on the signals it read; when
//! one of them changes, the scheduler re-runs the listener during the
//! settle phase of the next flush.
//!
//! # Anchors
//!
//! A listener lives as long as its anchor node stays in the live tree.
//! Derivations created while a view is rendering are anchored to that
//! view's node, so they are collected together with it. Derivations created
//! anywhere else are anchored to the root and live as long as their source
//! signals do.

use std::cell::RefCell;
use std::rc::Rc;

use super::context::{Scope, Tracked};
use super::runtime::Runtime;
use super::signal::Signal;
use super::subscriber::{Anchor, AnchorCell, Subscription, SubscriptionId};
use crate::error::{BoxError, ReactiveError};
use crate::view::ViewNode;

pub(crate) type DeriveFn<T> = Rc<dyn Fn(&Scope<'_>, &T) -> Result<T, ReactiveError>>;

pub(crate) fn derive_fn<T, F>(compute: F) -> DeriveFn<T>
where
    F: Fn(&Scope<'_>, &T) -> Result<T, ReactiveError> + 'static,
{
    Rc::new(compute)
}

/// One run of a derivation, subscribed to the signals that run read.
struct Listener<T> {
    id: SubscriptionId,
    compute: DeriveFn<T>,
    target: Signal<T>,
    anchor: Rc<AnchorCell>,
}

impl<T> Subscription for Listener<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn is_live(&self) -> bool {
        self.anchor.borrow().as_ref().is_some_and(Anchor::is_live)
    }

    fn rerun(self: Rc<Self>, runtime: &Runtime) {
        // Taking the anchor retires this entry.
        let Some(anchor) = self.anchor.borrow_mut().take() else {
            return;
        };
        runtime.derive_raw(self.compute.clone(), self.target.clone(), Some(anchor), None);
    }
}

impl Runtime {
    /// Run `compute` into `target` and subscribe a fresh listener.
    ///
    /// `outer` is the scope of the enclosing computation, if any. The result
    /// is written through it, so the enclosing computation records the
    /// target as a setter and never subscribes to it.
    pub(crate) fn derive_raw<T>(
        &self,
        compute: DeriveFn<T>,
        target: Signal<T>,
        anchor: Option<Anchor>,
        outer: Option<&Scope<'_>>,
    ) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        let nested = outer.and_then(|cx| cx.nested());
        let cell: Rc<AnchorCell> = Rc::new(RefCell::new(None));
        match (anchor, nested) {
            (Some(anchor), _) => *cell.borrow_mut() = Some(anchor),
            (None, Some(nested)) => nested.borrow_mut().push(cell.clone()),
            (None, None) => *cell.borrow_mut() = Some(Anchor::Root),
        }

        let listener: Rc<dyn Subscription> = Rc::new(Listener {
            id: SubscriptionId::new(),
            compute: compute.clone(),
            target: target.clone(),
            anchor: cell,
        });

        let prev = target.get_untracked();
        let Tracked { value, deps } = Scope::track(self, nested, |cx| {
            cx.record_write(target.id());
            compute(cx, &prev)
        });
        target.write(value.unwrap_or(prev), outer);

        deps.subscribe(&self.inner, |subscribers| {
            subscribers.listeners.push(listener.clone())
        });
        target
    }

    /// Create a signal computed from other signals.
    ///
    /// The computation runs once now and again whenever a signal it read
    /// changes. The target starts at `T::default()`, which the first run
    /// overwrites.
    pub fn derive<T, F>(&self, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + Default + 'static,
        F: Fn(&Scope<'_>) -> T + 'static,
    {
        let target = self.signal(T::default());
        self.derive_into(&target, move |cx, _| compute(cx))
    }

    /// Fallible form of [`Runtime::derive`].
    ///
    /// When the computation fails the error is reported and the target keeps
    /// its previous value.
    pub fn try_derive<T, E, F>(&self, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + Default + 'static,
        E: Into<BoxError>,
        F: Fn(&Scope<'_>) -> Result<T, E> + 'static,
    {
        self.derive_raw(
            derive_fn(move |cx, _| compute(cx).map_err(|e| ReactiveError::Computation(e.into()))),
            self.signal(T::default()),
            None,
            None,
        )
    }

    /// Feed an existing signal. The computation receives the target's
    /// current value.
    pub fn derive_into<T, F>(&self, target: &Signal<T>, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&Scope<'_>, &T) -> T + 'static,
    {
        self.derive_raw(
            derive_fn(move |cx, prev| Ok(compute(cx, prev))),
            target.clone(),
            None,
            None,
        )
    }

    /// Like [`Runtime::derive_into`], with the listener's lifetime tied to
    /// `node`.
    pub fn derive_anchored<T, N, F>(&self, target: &Signal<T>, node: &N, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
        N: ViewNode,
        F: Fn(&Scope<'_>, &T) -> T + 'static,
    {
        self.derive_raw(
            derive_fn(move |cx, prev| Ok(compute(cx, prev))),
            target.clone(),
            Some(Anchor::node(node)),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ErrorSink;
    use crate::view::MemNode;

    #[derive(Default)]
    struct CountingSink(Cell<usize>);

    impl ErrorSink for CountingSink {
        fn report(&self, _error: &ReactiveError) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn derive_runs_immediately() {
        let rt = Runtime::new();
        let a = rt.signal(2);
        let squared = rt.derive({
            let a = a.clone();
            move |cx| a.get(cx) * a.get(cx)
        });

        assert_eq!(squared.get_untracked(), 4);
        assert_eq!(a.listener_count(), 1);
    }

    #[test]
    fn dependencies_follow_the_last_run() {
        let rt = Runtime::new();
        let use_left = rt.signal(true);
        let left = rt.signal(1);
        let right = rt.signal(2);
        let runs = Rc::new(Cell::new(0));

        let picked = rt.derive({
            let (use_left, left, right, runs) =
                (use_left.clone(), left.clone(), right.clone(), runs.clone());
            move |cx| {
                runs.set(runs.get() + 1);
                if use_left.get(cx) {
                    left.get(cx)
                } else {
                    right.get(cx)
                }
            }
        });

        right.set(20);
        rt.flush();
        assert_eq!(runs.get(), 1);

        use_left.set(false);
        rt.flush();
        assert_eq!(picked.get_untracked(), 20);
        assert_eq!(runs.get(), 2);

        // The entry from the first run is retired.
        left.set(10);
        rt.flush();
        assert_eq!(runs.get(), 2);
        assert_eq!(left.listener_count(), 0);
    }

    #[test]
    fn derivation_does_not_subscribe_to_its_target() {
        let rt = Runtime::new();
        let step = rt.signal(1);
        let total = rt.signal(0);

        rt.derive_into(&total, {
            let (step, total) = (step.clone(), total.clone());
            move |cx, _| total.get(cx) + step.get(cx)
        });
        assert_eq!(total.get_untracked(), 1);
        assert_eq!(total.listener_count(), 0);

        step.set(5);
        rt.flush();
        assert_eq!(total.get_untracked(), 6);
    }

    #[test]
    fn derive_into_receives_previous_value() {
        let rt = Runtime::new();
        let ticks = rt.signal(0);
        let history = rt.signal(Vec::<i32>::new());

        rt.derive_into(&history, {
            let ticks = ticks.clone();
            move |cx, prev| {
                let mut next = prev.clone();
                next.push(ticks.get(cx));
                next
            }
        });

        ticks.set(1);
        rt.flush();
        ticks.set(2);
        rt.flush();

        assert_eq!(history.get_untracked(), vec![0, 1, 2]);
    }

    #[test]
    fn failure_keeps_previous_value() {
        let sink = Rc::new(CountingSink::default());
        let rt = Runtime::builder().error_sink(sink.clone()).build().unwrap();
        let input = rt.signal(String::from("4"));

        let parsed = rt.try_derive({
            let input = input.clone();
            move |cx| input.with(cx, |s| s.parse::<i32>())
        });
        assert_eq!(parsed.get_untracked(), 4);

        input.set(String::from("four"));
        rt.flush();
        assert_eq!(parsed.get_untracked(), 4);
        assert!(!parsed.is_dirty());
        assert_eq!(sink.0.get(), 1);

        // Still subscribed after the failure.
        input.set(String::from("5"));
        rt.flush();
        assert_eq!(parsed.get_untracked(), 5);
    }

    #[test]
    fn panic_is_recovered() {
        let sink = Rc::new(CountingSink::default());
        let rt = Runtime::builder().error_sink(sink.clone()).build().unwrap();
        let divisor = rt.signal(2);

        let quotient = rt.derive({
            let divisor = divisor.clone();
            move |cx| 10 / divisor.get(cx)
        });

        divisor.set(0);
        rt.flush();
        assert_eq!(quotient.get_untracked(), 5);
        assert_eq!(sink.0.get(), 1);

        divisor.set(5);
        rt.flush();
        assert_eq!(quotient.get_untracked(), 2);
    }

    #[test]
    fn anchored_derivation_dies_with_its_node() {
        let rt = Runtime::new();
        let root = MemNode::root();
        let node = MemNode::element("span");
        root.append_children(&[node.clone()]);

        let source = rt.signal(1);
        let target = rt.signal(0);
        rt.derive_anchored(&target, &node, {
            let source = source.clone();
            move |cx, _| source.get(cx)
        });

        source.set(2);
        rt.flush();
        assert_eq!(target.get_untracked(), 2);

        node.remove();
        source.set(3);
        rt.flush();
        assert_eq!(target.get_untracked(), 2);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn nested_derivation_is_anchored_to_the_view() {
        let rt = Runtime::new();
        let root = MemNode::root();
        let source = rt.signal(3);

        let view: MemNode = rt.bind({
            let source = source.clone();
            move |cx| {
                let doubled = cx.derive({
                    let source = source.clone();
                    move |cx| source.get(cx) * 2
                });
                doubled.get(cx).to_string()
            }
        });
        root.append_children(&[view.clone()]);
        assert_eq!(root.text_content(), "6");
        assert_eq!(source.listener_count(), 1);

        view.remove();
        rt.collect_garbage();
        assert_eq!(source.listener_count(), 0);
    }
}
