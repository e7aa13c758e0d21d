//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, bindings
//! and derivations. It owns the pending batch, the GC watch set, the error
//! sink and the local tasks spawned by async wrappers.
//!
//! # How It Works
//!
//! 1. Signals are created through the runtime and keep a weak handle to it.
//!
//! 2. A write to a signal with subscribers enqueues it into the pending
//!    batch. The first enqueue wakes the driver.
//!
//! 3. The driver ([`Runtime::run`] or [`Runtime::run_until`]) flushes once
//!    the code that wrote yields, sweeps stale subscriptions when the GC
//!    deadline passes, and polls spawned tasks.
//!
//! Code that does not run the driver can call [`Runtime::flush`] and
//! [`Runtime::collect_garbage`] directly.
//!
//! # Threading
//!
//! The runtime is single-threaded: it is built on `Rc` and `RefCell` and is
//! `!Send`. Run the driver on a current-thread tokio runtime, or on any
//! runtime from a task that does not need to be `Send` (such as the future
//! passed to `block_on` or a `#[tokio::test]` body).

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::signal::Signal;
use crate::config::{ConfigError, RuntimeConfig};
use crate::error::{ErrorSink, LogSink, ReactiveError};
use crate::graph::{GarbageCollector, UpdateScheduler};

pub(crate) struct RuntimeInner {
    pub(crate) config: RuntimeConfig,
    pub(crate) scheduler: UpdateScheduler,
    pub(crate) gc: GarbageCollector,
    sink: Rc<dyn ErrorSink>,
    wake: Notify,
    spawned: RefCell<Vec<LocalBoxFuture<'static, ()>>>,
}

impl RuntimeInner {
    /// Ask the driver for another turn.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    pub(crate) fn report(&self, error: &ReactiveError) {
        self.sink.report(error);
    }
}

/// Handle to a reactive runtime.
///
/// Cloning the handle shares the runtime. The runtime is torn down when the
/// last handle is dropped; signals outliving it keep working as plain cells.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

/// Builder for a [`Runtime`] with a custom configuration or error sink.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    sink: Rc<dyn ErrorSink>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn error_sink(mut self, sink: Rc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the configuration and create the runtime.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        self.config.validate()?;
        Ok(Runtime::with_parts(self.config, self.sink))
    }
}

impl Runtime {
    /// Create a runtime with the default configuration, logging failures
    /// through `tracing`.
    pub fn new() -> Self {
        Self::with_parts(RuntimeConfig::default(), Rc::new(LogSink))
    }

    fn with_parts(config: RuntimeConfig, sink: Rc<dyn ErrorSink>) -> Self {
        Runtime {
            inner: Rc::new(RuntimeInner {
                scheduler: UpdateScheduler::new(),
                gc: GarbageCollector::new(config.gc_interval()),
                config,
                sink,
                wake: Notify::new(),
                spawned: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder {
            config: RuntimeConfig::default(),
            sink: Rc::new(LogSink),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Create a signal holding `value`.
    pub fn signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Signal::new_in(Rc::downgrade(&self.inner), value)
    }

    /// Run the update scheduler for the pending batch, if any.
    pub fn flush(&self) {
        self.inner.scheduler.flush(self);
    }

    /// Whether writes are waiting for a flush.
    pub fn has_pending_flush(&self) -> bool {
        self.inner.scheduler.has_pending()
    }

    /// Sweep stale subscriptions from every watched signal now.
    pub fn collect_garbage(&self) {
        self.inner.gc.sweep();
    }

    pub(crate) fn report(&self, error: &ReactiveError) {
        self.inner.report(error);
    }

    /// Queue a local task. It is polled by the driver.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.inner.spawned.borrow_mut().push(task.boxed_local());
        self.inner.wake();
    }

    /// Drive the runtime forever.
    pub async fn run(&self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Drive the runtime until `future` completes and return its output.
    ///
    /// The future is polled first on every turn, so a flush happens each
    /// time it yields after writing. A last flush runs once it completes.
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        tokio::pin!(future);
        let mut tasks = FuturesUnordered::new();

        loop {
            tasks.extend(self.inner.spawned.borrow_mut().drain(..));
            self.flush();
            if self.inner.gc.is_due(Instant::now()) {
                self.collect_garbage();
            }
            let deadline = self.inner.gc.deadline();

            let finished = tokio::select! {
                biased;
                output = &mut future => Some(output),
                _ = self.inner.wake.notified() => None,
                Some(()) = tasks.next(), if !tasks.is_empty() => None,
                _ = wait_until(deadline) => None,
            };

            if let Some(output) = finished {
                self.flush();
                // Unfinished tasks go back to the queue for the next driver.
                self.inner.spawned.borrow_mut().extend(tasks);
                return output;
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn builder_rejects_invalid_config() {
        let config = RuntimeConfig {
            max_settle_rounds: 0,
            ..RuntimeConfig::default()
        };
        assert!(Runtime::builder().config(config).build().is_err());
    }

    #[test]
    fn builder_applies_config() {
        let config = RuntimeConfig {
            debounce_ms: 5,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::builder().config(config.clone()).build().unwrap();
        assert_eq!(rt.config(), &config);
    }

    #[test]
    fn new_uses_default_config() {
        let rt = Runtime::new();
        assert_eq!(rt.config(), &RuntimeConfig::default());
        assert_eq!(rt.config(), Runtime::builder().build().unwrap().config());
    }

    #[test]
    fn flush_without_writes_is_a_no_op() {
        let rt = Runtime::new();
        assert!(!rt.has_pending_flush());
        rt.flush();
        assert!(!rt.has_pending_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_flushes_after_writer_yields() {
        let rt = Runtime::new();
        let source = rt.signal(1);
        let runs = Rc::new(Cell::new(0));
        let mirror = rt.derive({
            let source = source.clone();
            let runs = runs.clone();
            move |cx| {
                runs.set(runs.get() + 1);
                source.get(cx)
            }
        });

        rt.run_until(async {
            source.set(2);
            source.set(3);
            assert_eq!(mirror.get_untracked(), 1);
            tokio::task::yield_now().await;
        })
        .await;

        assert_eq!(mirror.get_untracked(), 3);
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_flushes_writes_made_by_the_last_step() {
        let rt = Runtime::new();
        let source = rt.signal(1);
        let mirror = rt.derive({
            let source = source.clone();
            move |cx| source.get(cx)
        });

        rt.run_until(async {
            source.set(2);
        })
        .await;

        assert_eq!(mirror.get_untracked(), 2);
        assert!(!source.is_dirty());
        assert!(!rt.has_pending_flush());
    }

    #[tokio::test(start_paused = true)]
    async fn unfinished_tasks_survive_between_drivers() {
        let rt = Runtime::new();
        let done = Rc::new(Cell::new(false));

        rt.spawn({
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                done.set(true);
            }
        });

        rt.run_until(tokio::time::sleep(Duration::from_millis(50))).await;
        assert!(!done.get());

        rt.run_until(tokio::time::sleep(Duration::from_millis(200))).await;
        assert!(done.get());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_polls_spawned_tasks() {
        let rt = Runtime::new();
        let done = Rc::new(Cell::new(false));

        rt.spawn({
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.set(true);
            }
        });

        rt.run_until(tokio::time::sleep(Duration::from_millis(100))).await;
        assert!(done.get());
    }
}
