//! Async Debounce Wrapper
//!
//! [`Runtime::wrap_async`] turns a computation that produces a value that
//! may not be ready yet into a signal. Rapid re-invocations are collapsed:
//! only the latest invocation whose debounce window elapses without being
//! superseded gets to resolve and commit.
//!
//! Each invocation takes a generation number. The task spawned for it
//! sleeps through the window, then checks that its generation is still the
//! latest before polling the deferred value, and again before committing
//! the result. A superseded future is dropped without ever being polled.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use super::context::Scope;
use super::runtime::Runtime;
use super::signal::Signal;
use crate::error::{BoxError, ReactiveError};

/// A value that is either available now or produced by a future.
pub enum Deferred<T> {
    Ready(T),
    Pending(LocalBoxFuture<'static, Result<T, BoxError>>),
}

impl<T: 'static> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    /// Wrap a fallible future. An error is reported as
    /// [`ReactiveError::Deferred`].
    pub fn pending<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'static,
        E: Into<BoxError>,
    {
        Deferred::Pending(future.map(|result| result.map_err(Into::into)).boxed_local())
    }

    /// Wrap an infallible future.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = T> + 'static,
    {
        Deferred::Pending(future.map(Ok).boxed_local())
    }

    async fn resolve(self) -> Result<T, BoxError> {
        match self {
            Deferred::Ready(value) => Ok(value),
            Deferred::Pending(future) => future.await,
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Deferred::Ready(value)
    }
}

impl Runtime {
    /// Create a signal fed by a possibly asynchronous computation.
    ///
    /// `compute` runs like a derivation: once now and again whenever a
    /// signal it read changes. Every run restarts the debounce window
    /// ([`RuntimeConfig::debounce_ms`](crate::config::RuntimeConfig)); when
    /// the window of the latest run elapses its value is awaited and
    /// committed. The signal holds `None` until the first commit. A failed
    /// resolution is reported and leaves the signal unchanged.
    ///
    /// Resolution happens in local tasks polled by [`Runtime::run`] and
    /// [`Runtime::run_until`].
    pub fn wrap_async<T, D, F>(&self, compute: F) -> Signal<Option<T>>
    where
        T: Clone + PartialEq + 'static,
        D: Into<Deferred<T>>,
        F: Fn(&Scope<'_>) -> D + 'static,
    {
        let result = self.signal(None);
        let generation = Rc::new(Cell::new(0u64));
        let window = self.config().debounce();

        let _invocations = self.derive({
            let result = result.clone();
            move |cx| {
                let deferred: Deferred<T> = compute(cx).into();
                let current = generation.get() + 1;
                generation.set(current);

                let (result, generation) = (result.clone(), generation.clone());
                let runtime = Rc::downgrade(&cx.runtime().inner);
                cx.runtime().spawn(async move {
                    tokio::time::sleep(window).await;
                    if generation.get() != current {
                        return;
                    }

                    let outcome = deferred.resolve().await;
                    if generation.get() != current {
                        tracing::debug!(generation = current, "superseded async result discarded");
                        return;
                    }

                    match outcome {
                        Ok(value) => result.set(Some(value)),
                        Err(error) => {
                            if let Some(runtime) = runtime.upgrade() {
                                runtime.report(&ReactiveError::Deferred(error));
                            }
                        }
                    }
                });
                current
            }
        });

        result
    }

    /// Keyed form of [`Runtime::wrap_async`].
    ///
    /// The current values of `states` form a key. `compute` receives the key
    /// and runs once now and again only when the key changes, so a write
    /// that leaves every value equal starts no new debounce window. Signals
    /// read inside `compute` are not tracked.
    pub fn wrap_async_keyed<K, T, D, F>(&self, states: &[Signal<K>], compute: F) -> Signal<Option<T>>
    where
        K: Clone + PartialEq + 'static,
        T: Clone + PartialEq + 'static,
        D: Into<Deferred<T>>,
        F: Fn(&[K]) -> D + 'static,
    {
        let states = states.to_vec();
        let key = self.derive(move |cx| states.iter().map(|state| state.get(cx)).collect::<Vec<K>>());
        self.wrap_async(move |cx| key.with(cx, |key| compute(key.as_slice())))
    }
}
