use serde::{Deserialize, Serialize};

/// A host-representable default value, resolved by the normalizer from a
/// surface-syntax literal or recognized function call (`now()`,
/// `gen_random_uuid()`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// A recognized SQL function marker, emitted verbatim (e.g. `now()`).
    Func(String),
}

impl Value {
    /// Render this value as a SQL literal / expression suitable for a
    /// `DEFAULT` clause.
    pub fn to_sql_default(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bool(b) => b.to_string(),
            Value::Func(f) => f.clone(),
        }
    }
}
