//! The resolved frontend tree: the fully typechecked, symbol-resolved form
//! of a program as handed over by the frontend, read once by the IR builder
//! and never touched again.

mod tree;

pub use tree::*;

use serde::{Deserialize, Serialize};

/// An opaque frontend symbol. The frontend guarantees these are unique per
/// declaration across the whole program, so the builder can key its
/// cross-reference table on them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);
