//! Update Scheduler
//!
//! The scheduler owns the pending batch and runs the flush algorithm.
//!
//! # Algorithm
//!
//! A flush runs once per batch of synchronous writes, in two phases:
//!
//! 1. **Settle.** Starting from the signals whose current value differs from
//!    their committed one, re-run every live listener of those signals.
//!    Listeners write their derived signals, which may dirty further
//!    signals; repeat against the newly dirtied set until nothing changes or
//!    the round bound is reached. Hitting the bound stops derived
//!    propagation for this flush and logs a warning.
//!
//! 2. **Commit.** Take every signal still dirty, re-run each distinct live
//!    binding once, splice in the new node when it differs from the old
//!    anchor, then commit those signals.
//!
//! Entries are deduplicated by identity within a phase, so a computation
//! subscribed to several dirty signals runs once. Every settle round
//! re-runs the listeners of each signal written in the previous round,
//! even when the write restored its committed value.
//!
//! Writes made while views re-render fold into the current flush. They land
//! in a fresh batch, and a signal in that batch is not committed by the
//! pass that rendered it. The flush then runs another settle and commit
//! pass over the fresh batch. Passes share the settle round bound; at the
//! bound the remaining batch is committed without re-rendering.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use crate::reactive::signal::{AnySignal, SignalId};
use crate::reactive::subscriber::{SubscriberKind, Subscription, SubscriptionId};
use crate::reactive::{Runtime, RuntimeInner};

type Batch = IndexMap<SignalId, Rc<dyn AnySignal>>;

/// The update scheduler manages the pending batch and coordinates flushes.
pub(crate) struct UpdateScheduler {
    /// Signals written since the last flush started its commit phase.
    /// `None` while no flush is scheduled.
    pending: RefCell<Option<Batch>>,

    /// Signals written during the current settle round.
    settling: RefCell<Batch>,

    flushing: Cell<bool>,
}

/// Clears the flushing flag when dropped.
struct FlushGuard<'a>(&'a Cell<bool>);

impl<'a> FlushGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            pending: RefCell::new(None),
            settling: RefCell::new(IndexMap::new()),
            flushing: Cell::new(false),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Add a dirtied signal to the pending batch.
    ///
    /// The first signal of an empty batch wakes the driver.
    pub fn enqueue(&self, signal: Rc<dyn AnySignal>, runtime: &RuntimeInner) {
        let id = signal.id();
        self.settling.borrow_mut().insert(id, signal.clone());

        let mut pending = self.pending.borrow_mut();
        match pending.as_mut() {
            Some(batch) => {
                batch.insert(id, signal);
            }
            None => {
                let mut batch = IndexMap::new();
                batch.insert(id, signal);
                *pending = Some(batch);
                drop(pending);
                tracing::trace!(signal = ?id, "flush scheduled");
                runtime.wake();
            }
        }
    }

    /// Run one flush. Does nothing when no batch is pending or a flush is
    /// already running.
    pub fn flush(&self, runtime: &Runtime) {
        let mut dirty: Vec<Rc<dyn AnySignal>> = match self.pending.borrow().as_ref() {
            Some(batch) => batch.values().filter(|s| s.is_changed()).cloned().collect(),
            None => return,
        };
        let Some(_guard) = FlushGuard::enter(&self.flushing) else {
            return;
        };
        let _span = tracing::debug_span!("flush", dirty = dirty.len()).entered();

        let max_passes = runtime.config().max_settle_rounds;
        let (mut rounds, mut views, mut passes) = (0, 0, 0);
        let mut carried: Vec<Rc<dyn AnySignal>> = Vec::new();

        loop {
            rounds += self.settle(dirty, runtime);

            let mut changed = self.take_changed();
            for signal in carried.drain(..) {
                if !changed.iter().any(|c| c.id() == signal.id()) {
                    changed.push(signal);
                }
            }

            let bindings = collect_live(&changed, SubscriberKind::View);
            views += bindings.len();
            for binding in bindings {
                // An earlier re-render in this pass may have detached it.
                if binding.is_live() {
                    binding.rerun(runtime);
                }
            }
            passes += 1;

            // Signals rewritten by a re-render stay uncommitted and are
            // rendered again by the next pass.
            let rewritten: Vec<SignalId> = self
                .pending
                .borrow()
                .as_ref()
                .map(|batch| batch.keys().copied().collect())
                .unwrap_or_default();
            for signal in changed {
                if rewritten.contains(&signal.id()) {
                    carried.push(signal);
                } else {
                    signal.commit();
                }
            }

            dirty = match self.pending.borrow().as_ref() {
                Some(batch) => batch.values().cloned().collect(),
                None => break,
            };

            if passes == max_passes {
                tracing::warn!(
                    passes,
                    remaining = dirty.len(),
                    "views keep writing while rendering, remaining writes committed"
                );
                for signal in self.take_changed().into_iter().chain(carried) {
                    signal.commit();
                }
                break;
            }
        }

        tracing::trace!(rounds, passes, views, "flush complete");
    }

    /// Take the pending batch, keeping only the signals still changed.
    fn take_changed(&self) -> Vec<Rc<dyn AnySignal>> {
        self.pending
            .borrow_mut()
            .take()
            .map(|batch| batch.into_values().filter(|s| s.is_changed()).collect())
            .unwrap_or_default()
    }

    /// Phase one. Returns the number of rounds run.
    fn settle(&self, mut dirty: Vec<Rc<dyn AnySignal>>, runtime: &Runtime) -> usize {
        let max_rounds = runtime.config().max_settle_rounds;
        let mut rounds = 0;

        while !dirty.is_empty() {
            if rounds == max_rounds {
                tracing::warn!(
                    rounds,
                    remaining = dirty.len(),
                    "runaway dependency chain, derived propagation stopped"
                );
                break;
            }

            self.settling.borrow_mut().clear();
            for listener in collect_live(&dirty, SubscriberKind::Listener) {
                listener.rerun(runtime);
            }
            rounds += 1;

            // A write back to the committed value still re-runs its readers.
            dirty = self.settling.borrow_mut().drain(..).map(|(_, signal)| signal).collect();
        }

        rounds
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Prune dead entries of `kind` from each signal and return the distinct
/// live ones.
fn collect_live(signals: &[Rc<dyn AnySignal>], kind: SubscriberKind) -> Vec<Rc<dyn Subscription>> {
    let mut unique: IndexMap<SubscriptionId, Rc<dyn Subscription>> = IndexMap::new();
    for signal in signals {
        let mut subscribers = signal.subscribers().borrow_mut();
        let entries = subscribers.list_mut(kind);
        entries.retain(|entry| entry.is_live());
        for entry in entries.iter() {
            unique.entry(entry.id()).or_insert_with(|| entry.clone());
        }
    }
    unique.into_values().collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
