//! Error Types
//!
//! Computations that fail never abort propagation. The tracker reports the
//! failure to an [`ErrorSink`] and keeps the previous value in place, so the
//! graph always holds something valid.

use thiserror::Error;

/// Boxed error returned by fallible computations and deferred values.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// A failure raised while running reactive code.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A tracked computation returned an error.
    #[error("computation failed: {0}")]
    Computation(#[source] BoxError),

    /// A tracked computation panicked. The panic is caught and handled
    /// exactly like a returned error.
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// A deferred value awaited by the debounce wrapper failed.
    #[error("deferred value failed to resolve: {0}")]
    Deferred(#[source] BoxError),
}

impl ReactiveError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Receives failures that the engine recovers from.
///
/// Reporting is non-fatal: the engine has already substituted a fallback
/// value by the time `report` is called.
pub trait ErrorSink {
    fn report(&self, error: &ReactiveError);
}

/// Default sink. Logs every failure through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: &ReactiveError) {
        tracing::error!(error = %error, "reactive computation failed");
    }
}
