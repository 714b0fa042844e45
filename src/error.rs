// Error kinds. `StructuralMisuse` and `InvariantViolation` are programming
// errors, not recoverable parse failures -- the block parser itself is
// total over any byte sequence (see `parser.rs`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockTreeError {
    /// An `add_include` (or equivalent structural API) call targeted a node
    /// that cannot hold the requested child.
    #[error("structural misuse: {0}")]
    StructuralMisuse(String),

    /// A debug-only invariant check (`ParserOptions::debug_nodes`) failed.
    /// Indicates a bug in this crate, not in the input document.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
