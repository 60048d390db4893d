//! Source positions shared by every token, AST node, and diagnostic.

use serde::{Deserialize, Serialize};

/// A single point in a source file: byte offset plus 1-indexed line/column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

/// A half-open `[start, end)` range over a named source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(filename: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// A zero-width span at the start of an (assumed in-memory) file, used
    /// for synthetic nodes that have no source origin.
    pub fn synthetic() -> Self {
        Self {
            filename: String::new(),
            start: Position::start(),
            end: Position::start(),
        }
    }
}
