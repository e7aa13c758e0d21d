//! Output Tree
//!
//! The engine never touches a concrete display tree. It renders through the
//! [`ViewNode`] capability, which any tree can implement: a browser DOM, a
//! terminal widget tree, or the bundled in-memory [`MemNode`].
//!
//! # Results and Inputs
//!
//! A bound computation returns a [`View`], resolved once at the boundary into
//! a closed set of variants (node, text, list, empty). Children handed to
//! [`Runtime::append`](crate::reactive::Runtime::append) are expressed as
//! [`Child`] values, which distinguish static nodes, static text and bound
//! computations.

mod mem;
mod node;

pub use mem::{MemKind, MemNode};
pub use node::{Child, View, ViewNode};
