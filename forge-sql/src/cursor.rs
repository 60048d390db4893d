//! Opaque cursor encoding for keyset pagination.
//!
//! A cursor is the last row's resolved sort-column values, serialized and
//! base64-encoded so it travels safely in a query string without leaking the
//! underlying column values to a casual reader. Decoding never trusts the
//! result beyond shape: a cursor produced for one sort order is rejected if
//! replayed against a request with a different number of sort terms, since
//! the row-value comparison in [`crate::build`] needs one value per column.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::QueryError;
use crate::param::SqlParam;

pub fn encode(values: &[SqlParam]) -> String {
    let json = serde_json::to_vec(values).expect("SqlParam always serializes");
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode(cursor: &str, expected_len: usize) -> Result<Vec<SqlParam>, QueryError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| QueryError::InvalidCursor {
            reason: "not valid base64".to_string(),
        })?;
    let values: Vec<SqlParam> = serde_json::from_slice(&bytes).map_err(|_| QueryError::InvalidCursor {
        reason: "not a valid cursor payload".to_string(),
    })?;
    if values.len() != expected_len {
        return Err(QueryError::InvalidCursor {
            reason: format!(
                "cursor has {} value(s), expected {expected_len} for the current sort",
                values.len()
            ),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_and_decode() {
        let values = vec![SqlParam::Text("2024-01-01".into()), SqlParam::Int(7)];
        let cursor = encode(&values);
        let decoded = decode(&cursor, 2).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn garbage_input_is_rejected() {
        let err = decode("not-base64!!!", 1).unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let cursor = encode(&[SqlParam::Int(1)]);
        let err = decode(&cursor, 2).unwrap_err();
        assert_eq!(err.code(), "INVALID_CURSOR");
    }
}
