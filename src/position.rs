// Line/column position tracking, exposed to downstream consumers (inline
// parser, renderer, LSP-style tooling) the same way the upstream grammar
// layer exposes positions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Inclusive (start, end) range of a block node, in 1-based line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// A zero-width range at a single line, column 1, used when a node's
    /// exact opening column is not tracked (e.g. the document root).
    pub fn at_line(line: usize) -> Self {
        Self::at(line, 1)
    }

    /// A zero-width range at a single (line, column), used when a node is
    /// opened and not yet finalized.
    pub fn at(line: usize, column: usize) -> Self {
        let p = Position::new(line, column);
        Self::new(p, p)
    }
}
