//! Parse an HTTP query string into a [`ParsedRequest`].
//!
//! Keys follow the bracket convention: `filter[field]=value`,
//! `filter[field][op]=value`, `sort=-a,b`, `param.name=value`, `limit=n`,
//! `cursor=opaque`. Each pair is percent-decoded before its key is
//! dispatched on, so values carrying reserved characters still round-trip.

use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;

use crate::error::QueryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    IsNull,
}

impl FilterOp {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "neq" => Some(Self::Neq),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "in" => Some(Self::In),
            "is_null" => Some(Self::IsNull),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct RawSort {
    pub field: String,
    pub descending: bool,
}

/// The request, still in string form: [`crate::build::build`] resolves
/// field names against a `ViewNode` and coerces values into [`crate::param::SqlParam`].
#[derive(Debug, Clone, Default)]
pub struct ParsedRequest {
    pub limit: Option<usize>,
    pub filters: Vec<RawFilter>,
    pub sort: Vec<RawSort>,
    pub params: BTreeMap<String, String>,
    pub cursor: Option<String>,
}

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

/// Parse a raw query string (no leading `?`) into a [`ParsedRequest`].
pub fn parse(query: &str) -> Result<ParsedRequest, QueryError> {
    let mut request = ParsedRequest::default();
    if query.is_empty() {
        return Ok(request);
    }

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let mut parts = pair.splitn(2, '=');
        let raw_key = parts.next().unwrap_or("");
        let raw_value = parts.next().unwrap_or("");

        let key = decode(raw_key)?;
        let value = decode(raw_value)?;

        if key == "limit" {
            request.limit = Some(parse_limit(&value)?);
        } else if key == "sort" {
            request.sort = parse_sort(&value);
        } else if key == "cursor" {
            request.cursor = Some(value);
        } else if let Some(name) = key.strip_prefix("param.") {
            request.params.insert(name.to_string(), value);
        } else if let Some(filter) = parse_filter_key(&key, &value)? {
            request.filters.push(filter);
        }
    }

    Ok(request)
}

fn decode(raw: &str) -> Result<String, QueryError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.replace('+', " "))
        .map_err(|_| QueryError::InvalidFilter {
            field: raw.to_string(),
            reason: "not valid UTF-8".to_string(),
        })
}

fn parse_limit(value: &str) -> Result<usize, QueryError> {
    let n: usize = value.parse().map_err(|_| QueryError::InvalidLimit {
        value: value.to_string(),
        reason: "not a positive integer".to_string(),
    })?;
    if n == 0 || n > MAX_LIMIT {
        return Err(QueryError::InvalidLimit {
            value: value.to_string(),
            reason: format!("must be between 1 and {MAX_LIMIT}"),
        });
    }
    Ok(n)
}

pub fn effective_limit(parsed: Option<usize>) -> usize {
    parsed.unwrap_or(DEFAULT_LIMIT)
}

fn parse_sort(value: &str) -> Vec<RawSort> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|term| {
            if let Some(field) = term.strip_prefix('-') {
                RawSort {
                    field: field.to_string(),
                    descending: true,
                }
            } else {
                RawSort {
                    field: term.to_string(),
                    descending: false,
                }
            }
        })
        .collect()
}

/// `filter[field]=value` or `filter[field][op]=value`. Returns `Ok(None)`
/// for keys that aren't filter keys at all (so callers can ignore unknown
/// query parameters instead of rejecting the request).
fn parse_filter_key(key: &str, value: &str) -> Result<Option<RawFilter>, QueryError> {
    let Some(rest) = key.strip_prefix("filter[") else {
        return Ok(None);
    };
    let Some(close) = rest.find(']') else {
        return Err(QueryError::InvalidFilter {
            field: key.to_string(),
            reason: "missing closing `]`".to_string(),
        });
    };
    let field = &rest[..close];
    let after_field = &rest[close + 1..];

    let op = if after_field.is_empty() {
        FilterOp::Eq
    } else if let Some(op_rest) = after_field.strip_prefix('[') {
        let op_close = op_rest.find(']').ok_or_else(|| QueryError::InvalidFilter {
            field: field.to_string(),
            reason: "missing closing `]` for operator".to_string(),
        })?;
        let op_name = &op_rest[..op_close];
        FilterOp::from_str(op_name).ok_or_else(|| QueryError::InvalidFilter {
            field: field.to_string(),
            reason: format!("unknown operator `{op_name}`"),
        })?
    } else {
        return Err(QueryError::InvalidFilter {
            field: field.to_string(),
            reason: "malformed filter key".to_string(),
        });
    };

    Ok(Some(RawFilter {
        field: field.to_string(),
        op,
        value: value.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_operator_is_eq() {
        let req = parse("filter[status]=open").unwrap();
        assert_eq!(req.filters.len(), 1);
        assert_eq!(req.filters[0].field, "status");
        assert_eq!(req.filters[0].op, FilterOp::Eq);
        assert_eq!(req.filters[0].value, "open");
    }

    #[test]
    fn explicit_operator_is_parsed() {
        let req = parse("filter[age][gte]=21").unwrap();
        assert_eq!(req.filters[0].op, FilterOp::Gte);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = parse("filter[age][bogus]=21").unwrap_err();
        assert_eq!(err.code(), "INVALID_FILTER");
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        assert!(parse("limit=0").is_err());
        assert!(parse("limit=101").is_err());
        assert!(parse("limit=abc").is_err());
    }

    #[test]
    fn limit_within_range_is_accepted() {
        let req = parse("limit=10").unwrap();
        assert_eq!(req.limit, Some(10));
    }

    #[test]
    fn sort_parses_descending_prefix() {
        let req = parse("sort=-created_at,name").unwrap();
        assert_eq!(req.sort.len(), 2);
        assert!(req.sort[0].descending);
        assert_eq!(req.sort[0].field, "created_at");
        assert!(!req.sort[1].descending);
        assert_eq!(req.sort[1].field, "name");
    }

    #[test]
    fn param_prefix_is_stripped() {
        let req = parse("param.org_id=abc").unwrap();
        assert_eq!(req.params.get("org_id"), Some(&"abc".to_string()));
    }

    #[test]
    fn cursor_is_passed_through() {
        let req = parse("cursor=abc123").unwrap();
        assert_eq!(req.cursor.as_deref(), Some("abc123"));
    }

    #[test]
    fn unrecognized_keys_are_ignored() {
        let req = parse("unrelated=1").unwrap();
        assert!(req.filters.is_empty());
        assert!(req.limit.is_none());
    }
}
