//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, derived
//! signals, view bindings and the runtime that coordinates them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal is read through
//! a [`Scope`], the computation owning that scope subscribes to it. When the
//! signal is written with a different value, its subscribers re-run in the
//! next flush.
//!
//! ## Derived signals
//!
//! [`Runtime::derive`] feeds a signal from a computation over other
//! signals. Derived signals settle to a fixed point before any view is
//! re-rendered, so a view never observes a half-propagated state.
//!
//! ## Bindings
//!
//! [`Runtime::bind`] ties a view-producing computation to the node it
//! rendered. A re-render that produces a different node splices it in
//! place of the old one.
//!
//! ## Async values
//!
//! [`Runtime::wrap_async`] debounces a computation whose value may arrive
//! later and commits only the latest invocation. [`Runtime::wrap_async_keyed`]
//! re-runs its computation only when a key of signal values changes.
//!
//! # Implementation Notes
//!
//! Dependencies are rebuilt on every run: each run creates a fresh
//! subscription entry and retires the previous one. Retired and detached
//! entries are skipped by flushes and pruned by the garbage collector.
//!
//! Tracking is explicit. Every computation receives a `&Scope`, and only
//! reads made through it are recorded.

mod binding;
mod context;
mod deferred;
mod derive;
mod runtime;
pub(crate) mod signal;
pub(crate) mod subscriber;

pub use context::Scope;
pub use deferred::Deferred;
pub use runtime::{Runtime, RuntimeBuilder};
pub use signal::{Signal, SignalId};

pub(crate) use runtime::RuntimeInner;
