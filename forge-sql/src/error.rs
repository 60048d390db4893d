//! Errors the query builder can report back to an HTTP handler.

use thiserror::Error;

/// A rejected request to [`crate::build::build`] or
/// [`crate::build::build_count`].
///
/// Each variant's `code()` is the stable string an API surface would put in
/// an error body; the `Display` message is meant for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("limit {value} is invalid: {reason}")]
    InvalidLimit { value: String, reason: String },

    #[error("filter on `{field}` is invalid: {reason}")]
    InvalidFilter { field: String, reason: String },

    #[error("sort on `{field}` is invalid: {reason}")]
    InvalidSort { field: String, reason: String },

    #[error("cursor is invalid: {reason}")]
    InvalidCursor { reason: String },

    #[error("missing required parameter `{name}`")]
    MissingParam { name: String },
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidLimit { .. } => "INVALID_LIMIT",
            QueryError::InvalidFilter { .. } => "INVALID_FILTER",
            QueryError::InvalidSort { .. } => "INVALID_SORT",
            QueryError::InvalidCursor { .. } => "INVALID_CURSOR",
            QueryError::MissingParam { .. } => "MISSING_PARAM",
        }
    }
}
