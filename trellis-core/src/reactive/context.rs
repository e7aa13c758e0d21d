//! Tracking Scope
//!
//! The scope records which signals a computation reads and writes during a
//! single execution. Every computation receives a `&Scope` and performs its
//! tracked reads and writes through it.
//!
//! # Implementation
//!
//! Each tracked execution gets a fresh scope, so nesting needs no stack: a
//! derivation created inside a binding runs with its own scope and leaves
//! the binding's scope untouched. The only state a nested scope inherits is
//! the enclosing binding's nested-listener list, which lets derivations
//! created while rendering a view share that view's lifetime.
//!
//! Failures (returned errors and panics) never escape a tracked execution.
//! They are reported to the runtime's error sink and the caller keeps its
//! previous value.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::derive::derive_fn;
use super::runtime::{Runtime, RuntimeInner};
use super::signal::{AnySignal, Signal, SignalId};
use super::subscriber::{NestedListeners, Subscribers};
use crate::error::{BoxError, ReactiveError};
use crate::view::{View, ViewNode};

/// Signals read and written during one tracked execution.
#[derive(Default)]
pub(crate) struct DependencySet {
    getters: IndexMap<SignalId, Rc<dyn AnySignal>>,
    setters: IndexSet<SignalId>,
}

impl DependencySet {
    /// Subscribe an entry to every getter that was not also a setter.
    pub fn subscribe(self, runtime: &RuntimeInner, mut attach: impl FnMut(&mut Subscribers)) {
        for (id, signal) in self.getters {
            if self.setters.contains(&id) {
                continue;
            }
            runtime.gc.watch(&signal, runtime);
            attach(&mut signal.subscribers().borrow_mut());
        }
    }

    #[cfg(test)]
    pub fn getter_ids(&self) -> Vec<SignalId> {
        self.getters
            .keys()
            .filter(|id| !self.setters.contains(*id))
            .copied()
            .collect()
    }
}

/// Outcome of a tracked execution. `value` is `None` when the computation
/// failed; the failure has already been reported.
pub(crate) struct Tracked<R> {
    pub value: Option<R>,
    pub deps: DependencySet,
}

/// Handle passed to every reactive computation.
///
/// Reads made through the scope ([`Signal::get`], [`Signal::with`],
/// [`Signal::get_committed`]) subscribe the computation to the signal;
/// writes made through it ([`Signal::set_tracked`]) mark the signal as
/// written so the computation never subscribes to its own output.
pub struct Scope<'a> {
    runtime: &'a Runtime,
    nested: Option<&'a NestedListeners>,
    deps: RefCell<DependencySet>,
}

impl<'a> Scope<'a> {
    fn new(runtime: &'a Runtime, nested: Option<&'a NestedListeners>) -> Self {
        Self {
            runtime,
            nested,
            deps: RefCell::new(DependencySet::default()),
        }
    }

    /// Run `f` under a fresh scope and capture its dependencies.
    pub(crate) fn track<R>(
        runtime: &'a Runtime,
        nested: Option<&'a NestedListeners>,
        f: impl FnOnce(&Scope<'_>) -> Result<R, ReactiveError>,
    ) -> Tracked<R> {
        let scope = Scope::new(runtime, nested);
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&scope)))
            .unwrap_or_else(|payload| Err(ReactiveError::from_panic(payload)));

        let value = match outcome {
            Ok(value) => Some(value),
            Err(error) => {
                runtime.report(&error);
                None
            }
        };

        Tracked {
            value,
            deps: scope.deps.into_inner(),
        }
    }

    /// The runtime this computation runs in.
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    pub(crate) fn nested(&self) -> Option<&'a NestedListeners> {
        self.nested
    }

    pub(crate) fn record_read<T>(&self, signal: &Signal<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        self.deps
            .borrow_mut()
            .getters
            .entry(signal.id())
            .or_insert_with(|| signal.erased());
    }

    pub(crate) fn record_write(&self, id: SignalId) {
        self.deps.borrow_mut().setters.insert(id);
    }

    /// Create a derived signal owned by this computation.
    ///
    /// Inside a bound view the derivation is collected together with the
    /// view's node.
    pub fn derive<T, F>(&self, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + Default + 'static,
        F: Fn(&Scope<'_>) -> T + 'static,
    {
        let target = self.runtime.signal(T::default());
        self.derive_into(&target, move |cx, _| compute(cx))
    }

    /// Feed `target` from `compute`, which also receives the target's
    /// current value.
    pub fn derive_into<T, F>(&self, target: &Signal<T>, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
        F: Fn(&Scope<'_>, &T) -> T + 'static,
    {
        self.runtime.derive_raw(
            derive_fn(move |cx, prev| Ok(compute(cx, prev))),
            target.clone(),
            None,
            Some(self),
        )
    }

    /// Fallible form of [`Scope::derive`].
    pub fn try_derive<T, E, F>(&self, compute: F) -> Signal<T>
    where
        T: Clone + PartialEq + Default + 'static,
        E: Into<BoxError>,
        F: Fn(&Scope<'_>) -> Result<T, E> + 'static,
    {
        self.runtime.derive_raw(
            derive_fn(move |cx, _| compute(cx).map_err(|e| ReactiveError::Computation(e.into()))),
            self.runtime.signal(T::default()),
            None,
            Some(self),
        )
    }

    /// Bind a nested view. Equivalent to [`Runtime::bind`].
    pub fn bind<N, V, F>(&self, view: F) -> N
    where
        N: ViewNode,
        V: Into<View<N>>,
        F: Fn(&Scope<'_>) -> V + 'static,
    {
        self.runtime.bind(view)
    }
}
