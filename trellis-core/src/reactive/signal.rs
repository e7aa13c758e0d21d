//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read through a [`Scope`], the scope records it as a
//!    getter. Once the computation finishes, the computation's entry is
//!    pushed onto the signal's subscriber lists.
//!
//! 2. When a signal is written with a different value and has subscribers,
//!    it is enqueued into the runtime's pending batch. The first signal
//!    enqueued into an empty batch asks the runtime for one flush, so every
//!    write made in the same synchronous turn lands in the same flush.
//!
//! 3. A signal without subscribers commits immediately: nothing observes it.
//!
//! # Two Values
//!
//! Each signal keeps its current value and the value committed at the end of
//! the last flush. They only differ while a write is waiting for its flush.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::Scope;
use super::runtime::RuntimeInner;
use super::subscriber::Subscribers;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Type-erased view of a signal used by the scheduler and the GC.
pub(crate) trait AnySignal {
    fn id(&self) -> SignalId;

    /// Whether the current value differs from the last committed one.
    fn is_changed(&self) -> bool;

    /// Make the current value the committed one.
    fn commit(&self);

    fn subscribers(&self) -> &RefCell<Subscribers>;
}

pub(crate) struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
    committed: RefCell<T>,
    subscribers: RefCell<Subscribers>,
    runtime: Weak<RuntimeInner>,
}

impl<T> AnySignal for SignalInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn id(&self) -> SignalId {
        self.id
    }

    fn is_changed(&self) -> bool {
        *self.value.borrow() != *self.committed.borrow()
    }

    fn commit(&self) {
        let value = self.value.borrow().clone();
        *self.committed.borrow_mut() = value;
    }

    fn subscribers(&self) -> &RefCell<Subscribers> {
        &self.subscribers
    }
}

/// A reactive cell holding a value of type `T`.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
/// let doubled = rt.derive({
///     let count = count.clone();
///     move |cx| count.get(cx) * 2
/// });
///
/// count.set(5);
/// rt.flush();
/// assert_eq!(doubled.get_untracked(), 10);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + 'static,
{
    pub(crate) fn new_in(runtime: Weak<RuntimeInner>, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::next(),
                committed: RefCell::new(value.clone()),
                value: RefCell::new(value),
                subscribers: RefCell::new(Subscribers::default()),
                runtime,
            }),
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    pub(crate) fn erased(&self) -> Rc<dyn AnySignal> {
        self.inner.clone()
    }

    /// Read the current value and record the signal as a getter of `cx`.
    pub fn get(&self, cx: &Scope<'_>) -> T {
        cx.record_read(self);
        self.get_untracked()
    }

    /// Borrow the current value and record the signal as a getter of `cx`.
    pub fn with<R>(&self, cx: &Scope<'_>, f: impl FnOnce(&T) -> R) -> R {
        cx.record_read(self);
        f(&self.inner.value.borrow())
    }

    /// Read the value committed by the last flush.
    ///
    /// Inside a bound computation this is the value the view showed before
    /// the write that triggered the re-render.
    pub fn get_committed(&self, cx: &Scope<'_>) -> T {
        cx.record_read(self);
        self.inner.committed.borrow().clone()
    }

    /// Read the current value without establishing a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Write a new value from outside any computation.
    pub fn set(&self, value: T) {
        self.write(value, None);
    }

    /// Write a new value and record the signal as a setter of `cx`.
    ///
    /// A computation that reads and writes the same signal does not
    /// subscribe to it.
    pub fn set_tracked(&self, cx: &Scope<'_>, value: T) {
        self.write(value, Some(cx));
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.inner.value.borrow());
        self.set(new_value);
    }

    pub(crate) fn write(&self, value: T, cx: Option<&Scope<'_>>) {
        if let Some(cx) = cx {
            cx.record_write(self.id());
        }

        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        let runtime = self.inner.runtime.upgrade();
        match runtime {
            Some(runtime) if self.subscriber_count() > 0 => {
                runtime.scheduler.enqueue(self.erased(), &runtime);
            }
            _ => self.inner.commit(),
        }
    }

    /// Number of bindings and listeners currently stored, live or not.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Number of view bindings currently stored.
    pub fn view_count(&self) -> usize {
        self.inner.subscribers.borrow().views.len()
    }

    /// Number of derived-signal listeners currently stored.
    pub fn listener_count(&self) -> usize {
        self.inner.subscribers.borrow().listeners.len()
    }

    /// Whether a write is waiting for a flush.
    pub fn is_dirty(&self) -> bool {
        self.inner.is_changed()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("committed", &*self.inner.committed.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
