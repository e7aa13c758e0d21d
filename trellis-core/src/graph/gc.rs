//! Garbage Collector
//!
//! Subscriptions are never removed when a write happens. Instead, every
//! signal that gains a subscriber is put on a watch list, and a sweep some
//! time later drops the entries whose anchor node has left the live tree.
//!
//! The sweep is housekeeping only. Flushes filter out dead entries on their
//! own, so correctness never depends on when (or whether) a sweep runs.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::reactive::signal::{AnySignal, SignalId};
use crate::reactive::RuntimeInner;

pub(crate) struct GarbageCollector {
    interval: Duration,
    watched: RefCell<IndexMap<SignalId, Weak<dyn AnySignal>>>,
    deadline: Cell<Option<Instant>>,
}

impl GarbageCollector {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            watched: RefCell::new(IndexMap::new()),
            deadline: Cell::new(None),
        }
    }

    /// Put `signal` on the watch list. The first signal of an idle cycle
    /// arms the sweep deadline.
    pub fn watch(&self, signal: &Rc<dyn AnySignal>, runtime: &RuntimeInner) {
        if self.deadline.get().is_none() {
            self.deadline.set(Some(Instant::now() + self.interval));
            runtime.wake();
        }
        self.watched
            .borrow_mut()
            .entry(signal.id())
            .or_insert_with(|| Rc::downgrade(signal));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.get()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.get().is_some_and(|deadline| deadline <= now)
    }

    #[cfg(test)]
    pub fn watched_count(&self) -> usize {
        self.watched.borrow().len()
    }

    /// Drop dead entries from every watched signal and go idle.
    pub fn sweep(&self) {
        let watched = std::mem::take(&mut *self.watched.borrow_mut());
        self.deadline.set(None);

        let mut pruned = 0;
        for signal in watched.values().filter_map(Weak::upgrade) {
            pruned += signal.subscribers().borrow_mut().retain_live();
        }

        tracing::debug!(signals = watched.len(), pruned, "gc sweep");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::reactive::Runtime;
    use crate::view::{MemNode, ViewNode};

    #[test]
    fn subscribing_arms_the_deadline() {
        let rt = Runtime::new();
        assert!(rt.inner.gc.deadline().is_none());

        let source = rt.signal(1);
        let _mirror = rt.derive({
            let source = source.clone();
            move |cx| source.get(cx)
        });

        assert!(rt.inner.gc.deadline().is_some());
        assert_eq!(rt.inner.gc.watched_count(), 1);
    }

    #[test]
    fn sweep_drops_detached_views_and_goes_idle() {
        let rt = Runtime::new();
        let root = MemNode::root();
        let count = rt.signal(0);

        let view: MemNode = rt.bind({
            let count = count.clone();
            move |cx| format!("{}", count.get(cx))
        });
        root.append_children(&[view.clone()]);
        assert_eq!(count.view_count(), 1);

        view.remove();
        rt.collect_garbage();

        assert_eq!(count.view_count(), 0);
        assert!(rt.inner.gc.deadline().is_none());
        assert_eq!(rt.inner.gc.watched_count(), 0);
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let rt = Runtime::new();
        let root = MemNode::root();
        let count = rt.signal(0);

        let view: MemNode = rt.bind({
            let count = count.clone();
            move |cx| format!("{}", count.get(cx))
        });
        root.append_children(&[view]);
        let _mirror = rt.derive({
            let count = count.clone();
            move |cx| count.get(cx)
        });

        rt.collect_garbage();

        assert_eq!(count.view_count(), 1);
        assert_eq!(count.listener_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_sweeps_after_interval() {
        let rt = Runtime::new();
        let root = MemNode::root();
        let count = rt.signal(0);

        let view: MemNode = rt.bind({
            let count = count.clone();
            move |cx| format!("{}", count.get(cx))
        });
        root.append_children(&[view.clone()]);
        view.remove();
        assert_eq!(count.view_count(), 1);

        rt.run_until(tokio::time::sleep(Duration::from_millis(1100))).await;

        assert_eq!(count.view_count(), 0);
    }
}
