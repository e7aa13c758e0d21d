//! Propagation Graph
//!
//! This module holds the machinery that acts on the graph formed by signals
//! and their subscribers, as opposed to the primitives themselves.
//!
//! # Overview
//!
//! - [`UpdateScheduler`] batches writes and runs the two-phase flush: settle
//!   derived signals to a fixed point, then re-render views once and commit.
//! - [`GarbageCollector`] periodically prunes subscriptions whose anchor
//!   node has left the live output tree.
//!
//! The graph has no central node table. Edges live on the signals
//! themselves, as subscriber lists, and are rebuilt every time a
//! computation runs.

mod gc;
mod scheduler;

pub(crate) use gc::GarbageCollector;
pub(crate) use scheduler::UpdateScheduler;
