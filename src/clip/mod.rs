//! Clip tree and its temporal model.
//!
//! Every node resolves `start`, `end` and `duration` from its own configuration, its parent's
//! duration and its previous sibling's end. The resolved values are cached per node by
//! [`ClipTree::annotate`].

mod expr;
mod node;
mod resolve;
mod tree;

pub use expr::TimeExpr;
pub use node::{ClipConf, ClipKind, ClipNode, ClipTiming};
pub use tree::{ClipId, ClipTree, DEFAULT_TRANSITION_DURATION, FALLBACK_DURATION};
