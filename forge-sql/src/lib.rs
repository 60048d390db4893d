//! Runtime SQL query builder for compiled FORGE views.
//!
//! [`query_params::parse`] turns a request's query string into a
//! [`query_params::ParsedRequest`]; [`build::build`] resolves that request
//! against a `forge_core::ViewNode` into parameterized SQL.

pub mod build;
pub mod builder;
pub mod cursor;
pub mod error;
pub mod expr;
pub mod param;
pub mod query_params;

pub use build::{build, build_count, BuiltQuery};
pub use error::QueryError;
pub use param::SqlParam;
pub use query_params::{parse as parse_query, ParsedRequest};
