//! SQL parameter values bound to `$N` placeholders.

use serde::{Deserialize, Serialize};

/// A bound SQL parameter.
///
/// Query-string values arrive as `&str`; [`crate::query_params`] coerces
/// them into the variant matching the target field's `sql_type` before a
/// [`SqlParam`] is ever constructed, so by the time one reaches
/// [`crate::builder::SqlFragment`] it is already typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(uuid::Uuid),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Array(Vec<SqlParam>),
}

impl SqlParam {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The PostgreSQL type name this parameter would be cast to, used when
    /// a placeholder needs an explicit `::type` annotation to disambiguate
    /// an untyped literal (e.g. inside an array or next to `IS NULL`).
    pub fn pg_type(&self) -> &'static str {
        match self {
            Self::Null => "unknown",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "bigint",
            Self::Float(_) => "double precision",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamptz",
            Self::Array(items) => match items.first() {
                Some(Self::Int(_)) => "bigint[]",
                Some(Self::Float(_)) => "double precision[]",
                Some(Self::Bool(_)) => "boolean[]",
                Some(Self::Uuid(_)) => "uuid[]",
                _ => "text[]",
            },
        }
    }
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for SqlParam {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for SqlParam {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for SqlParam {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<uuid::Uuid> for SqlParam {
    fn from(id: uuid::Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlParam {
    fn from(ts: chrono::DateTime<chrono::Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pg_type_covers_scalars() {
        assert_eq!(SqlParam::Text("a".into()).pg_type(), "text");
        assert_eq!(SqlParam::Int(1).pg_type(), "bigint");
        assert_eq!(SqlParam::Null.pg_type(), "unknown");
    }

    #[test]
    fn pg_type_of_array_follows_first_element() {
        let arr = SqlParam::Array(vec![SqlParam::Int(1), SqlParam::Int(2)]);
        assert_eq!(arr.pg_type(), "bigint[]");
        assert_eq!(SqlParam::Array(vec![]).pg_type(), "text[]");
    }
}
