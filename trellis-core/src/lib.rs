//! Trellis Core
//!
//! This crate provides a fine-grained reactive engine that keeps an output
//! tree in sync with application state. It implements:
//!
//! - Reactive signals with last-committed values
//! - Derived signals that settle before any view re-renders
//! - View bindings that splice re-rendered nodes into place
//! - Batched two-phase flushes with a runaway-propagation bound
//! - Lazy garbage collection of subscriptions on detached nodes
//! - A debounced wrapper for asynchronously produced values
//!
//! The output tree is abstract: anything implementing [`view::ViewNode`]
//! can be driven. [`view::MemNode`] is a small in-memory tree for tests and
//! headless use.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, derivations, bindings and the runtime
//! - `graph`: Flush scheduling and garbage collection
//! - `view`: The node capability and view result types
//! - `config`: Runtime tunables
//! - `error`: Error types and the error sink
//!
//! # Example
//!
//! ```rust
//! use trellis_core::reactive::Runtime;
//! use trellis_core::view::{Child, MemNode, ViewNode};
//!
//! let rt = Runtime::new();
//! let root = MemNode::root();
//!
//! // Create a signal
//! let count = rt.signal(1);
//!
//! // Create a derived value
//! let doubled = rt.derive({
//!     let count = count.clone();
//!     move |cx| count.get(cx) * 2
//! });
//!
//! // Bind it into the tree
//! let label = rt.append(
//!     &MemNode::element("p"),
//!     [Child::text("Doubled: "), Child::signal(&doubled)],
//! );
//! root.append_children(&[label]);
//! assert_eq!(root.text_content(), "Doubled: 2");
//!
//! // Update the signal; the view follows on the next flush
//! count.set(5);
//! rt.flush();
//! assert_eq!(root.text_content(), "Doubled: 10");
//! ```

pub mod config;
pub mod error;
mod graph;
pub mod reactive;
pub mod view;
