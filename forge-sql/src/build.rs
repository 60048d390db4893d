//! Assemble a paginated `SELECT` (and its matching `COUNT`) over a compiled
//! [`ViewNode`] from a parsed client request.

use forge_core::{JoinKind, ResolvedField, SortSpec, ViewNode};

use crate::builder::SqlFragment;
use crate::cursor;
use crate::error::QueryError;
use crate::expr::{Expr, OrderExpr};
use crate::param::SqlParam;
use crate::query_params::{self, FilterOp, ParsedRequest};

/// The result of [`build`]: ready-to-execute SQL, its positional parameters,
/// the effective row limit (before the `+1` over-fetch), and the sort this
/// page was actually ordered by.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub limit: usize,
    pub resolved_sort: Vec<SortSpec>,
}

/// Build the paginated `SELECT` for `view` against `request`.
pub fn build(view: &ViewNode, request: &ParsedRequest) -> Result<BuiltQuery, QueryError> {
    let limit = query_params::effective_limit(request.limit);
    let resolved_sort = resolve_sort(view, request)?;

    let mut sql = SqlFragment::new();
    sql.append(select_clause(view));
    sql.push(" FROM ");
    sql.append(from_clause(view));

    let where_fragment = where_clause(view, request, &resolved_sort)?;
    if !where_fragment.is_empty() {
        sql.push(" WHERE ");
        sql.append(where_fragment);
    }

    sql.push(" ORDER BY ");
    sql.append(order_by_clause(&resolved_sort));

    sql.push(&format!(" LIMIT {}", limit + 1));

    let (text, params) = sql.build();
    Ok(BuiltQuery {
        sql: text,
        params,
        limit,
        resolved_sort,
    })
}

/// Build the matching row-count query: same FROM/JOIN/WHERE, no ordering or
/// limit, so pagination metadata can report a total independent of the page
/// size.
pub fn build_count(view: &ViewNode, request: &ParsedRequest) -> Result<(String, Vec<SqlParam>), QueryError> {
    let resolved_sort = resolve_sort(view, request)?;

    let mut sql = SqlFragment::raw("SELECT COUNT(*) FROM ");
    sql.append(from_clause(view));

    let where_fragment = where_clause(view, request, &resolved_sort)?;
    if !where_fragment.is_empty() {
        sql.push(" WHERE ");
        sql.append(where_fragment);
    }

    Ok(sql.build())
}

fn select_clause(view: &ViewNode) -> SqlFragment {
    let mut sql = SqlFragment::raw("SELECT ");
    let columns: Vec<SqlFragment> = view
        .fields
        .iter()
        .map(|f| SqlFragment::raw(format!("{} AS \"{}\"", f.sql, f.alias)))
        .collect();
    sql.append(SqlFragment::join(", ", columns));
    sql
}

fn from_clause(view: &ViewNode) -> SqlFragment {
    let mut sql = SqlFragment::raw(format!("{} t", view.source_table));
    for join in &view.joins {
        let kind = match join.kind {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Inner => "INNER JOIN",
        };
        sql.push(&format!(" {kind} {} {} ON {}", join.table, join.alias, join.on));
    }
    sql
}

fn field_by_name<'a>(view: &'a ViewNode, name: &str) -> Option<&'a ResolvedField> {
    view.fields.iter().find(|f| f.name == name)
}

fn where_clause(
    view: &ViewNode,
    request: &ParsedRequest,
    resolved_sort: &[SortSpec],
) -> Result<SqlFragment, QueryError> {
    let mut clauses = Vec::new();

    if let Some(static_filter) = &view.filter_sql {
        clauses.push(bind_static_filter(static_filter, view, request)?);
    }

    for filter in &request.filters {
        clauses.push(client_filter_fragment(view, filter)?);
    }

    if let Some(cursor_value) = &request.cursor {
        clauses.push(cursor_fragment(resolved_sort, cursor_value)?);
    }

    Ok(SqlFragment::join(" AND ", clauses.into_iter().map(|e| e.into_fragment().parens())))
}

/// Substitute the view's declared `param.<name>` placeholders with the
/// request's `param.<name>=` values, in the view's first-occurrence order.
fn bind_static_filter(template: &str, view: &ViewNode, request: &ParsedRequest) -> Result<SqlFragment, QueryError> {
    let mut values = Vec::with_capacity(view.filter_params.len());
    for name in &view.filter_params {
        let value = request
            .params
            .get(name)
            .ok_or_else(|| QueryError::MissingParam { name: name.clone() })?;
        values.push(value);
    }

    // Re-render the template with concrete parameter pushes so the final
    // fragment carries real SqlParam values rather than bare placeholders.
    let mut rendered = SqlFragment::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            rendered.push(&c.to_string());
            continue;
        }
        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let index: usize = digits.parse().unwrap_or(0);
        match values.get(index.wrapping_sub(1)) {
            Some(value) => {
                rendered.push_param(SqlParam::Text((*value).clone()));
            }
            None => rendered.push(&format!("${digits}")),
        }
    }
    Ok(Expr::from_fragment(rendered))
}

fn client_filter_fragment(view: &ViewNode, filter: &query_params::RawFilter) -> Result<Expr, QueryError> {
    let field = field_by_name(view, &filter.field).ok_or_else(|| QueryError::InvalidFilter {
        field: filter.field.clone(),
        reason: "no such field".to_string(),
    })?;
    if !field.filterable {
        return Err(QueryError::InvalidFilter {
            field: filter.field.clone(),
            reason: "field is not filterable".to_string(),
        });
    }

    match filter.op {
        FilterOp::IsNull => {
            let is_null: bool = filter.value.parse().map_err(|_| QueryError::InvalidFilter {
                field: filter.field.clone(),
                reason: "is_null expects `true` or `false`".to_string(),
            })?;
            Ok(if is_null {
                Expr::is_null(&field.sql)
            } else {
                Expr::is_not_null(&field.sql)
            })
        }
        FilterOp::In => {
            let values: Result<Vec<SqlParam>, QueryError> = filter
                .value
                .split(',')
                .map(|raw| coerce(field, raw))
                .collect();
            Ok(Expr::in_list(&field.sql, values?))
        }
        FilterOp::Like => Ok(Expr::ilike_contains(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Eq => Ok(Expr::eq(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Neq => Ok(Expr::neq(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Gt => Ok(Expr::gt(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Gte => Ok(Expr::gte(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Lt => Ok(Expr::lt(&field.sql, coerce(field, &filter.value)?)),
        FilterOp::Lte => Ok(Expr::lte(&field.sql, coerce(field, &filter.value)?)),
    }
}

fn coerce(field: &ResolvedField, raw: &str) -> Result<SqlParam, QueryError> {
    let invalid = |reason: &str| QueryError::InvalidFilter {
        field: field.name.clone(),
        reason: reason.to_string(),
    };
    match field.sql_type.as_str() {
        "integer" => raw
            .parse::<i64>()
            .map(SqlParam::Int)
            .map_err(|_| invalid("not a valid integer")),
        "double precision" => raw
            .parse::<f64>()
            .map(SqlParam::Float)
            .map_err(|_| invalid("not a valid number")),
        "boolean" => raw
            .parse::<bool>()
            .map(SqlParam::Bool)
            .map_err(|_| invalid("not a valid boolean")),
        "uuid" => uuid::Uuid::parse_str(raw)
            .map(SqlParam::Uuid)
            .map_err(|_| invalid("not a valid uuid")),
        "timestamptz" => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| SqlParam::Timestamp(dt.with_timezone(&chrono::Utc)))
            .map_err(|_| invalid("not a valid RFC 3339 timestamp")),
        _ => Ok(SqlParam::Text(raw.to_string())),
    }
}

fn resolve_sort(view: &ViewNode, request: &ParsedRequest) -> Result<Vec<SortSpec>, QueryError> {
    let mut resolved = Vec::new();

    if request.sort.is_empty() {
        resolved.extend(view.default_sort.iter().cloned());
    } else {
        for term in &request.sort {
            let field = field_by_name(view, &term.field).ok_or_else(|| QueryError::InvalidSort {
                field: term.field.clone(),
                reason: "no such field".to_string(),
            })?;
            if !field.sortable {
                return Err(QueryError::InvalidSort {
                    field: term.field.clone(),
                    reason: "field is not sortable".to_string(),
                });
            }
            resolved.push(SortSpec {
                column: field.sql.clone(),
                descending: term.descending,
            });
        }
    }

    let has_id_tiebreaker = resolved.iter().any(|s| s.column == "t.id");
    if !has_id_tiebreaker {
        resolved.push(SortSpec {
            column: "t.id".to_string(),
            descending: true,
        });
    }

    Ok(resolved)
}

fn order_by_clause(sort: &[SortSpec]) -> SqlFragment {
    let terms: Vec<SqlFragment> = sort
        .iter()
        .map(|s| OrderExpr::new(s.column.clone(), s.descending).into_fragment())
        .collect();
    SqlFragment::join(", ", terms)
}

/// Keyset predicate from an opaque cursor: an equality-prefix disjunction
/// when sort directions are mixed, or a single row-value comparison when
/// every term shares one direction.
fn cursor_fragment(sort: &[SortSpec], cursor_value: &str) -> Result<Expr, QueryError> {
    let values = cursor::decode(cursor_value, sort.len())?;

    let uniform_desc = sort.iter().all(|s| s.descending);
    let uniform_asc = sort.iter().all(|s| !s.descending);

    if uniform_asc || uniform_desc {
        let mut lhs = SqlFragment::raw("(");
        lhs.append(SqlFragment::join(", ", sort.iter().map(|s| SqlFragment::raw(s.column.clone()))));
        lhs.push(")");

        let mut rhs = SqlFragment::raw("(");
        let mut value_frags = Vec::new();
        for value in &values {
            let mut f = SqlFragment::new();
            f.push_param(value.clone());
            value_frags.push(f);
        }
        rhs.append(SqlFragment::join(", ", value_frags));
        rhs.push(")");

        let op = if uniform_desc { " < " } else { " > " };
        let mut frag = lhs;
        frag.push(op);
        frag.append(rhs);
        return Ok(Expr::from_fragment(frag));
    }

    let mut branches = Vec::with_capacity(sort.len());
    for i in 0..sort.len() {
        let mut equalities = Vec::with_capacity(i);
        for j in 0..i {
            equalities.push(Expr::eq(&sort[j].column, values[j].clone()));
        }
        let comparator = if sort[i].descending {
            Expr::lt(&sort[i].column, values[i].clone())
        } else {
            Expr::gt(&sort[i].column, values[i].clone())
        };
        equalities.push(comparator);
        branches.push(Expr::and_all(equalities));
    }
    Ok(Expr::or_all(branches))
}

/// Encode the cursor a client should send to fetch the page after `row`'s
/// sort-column values.
pub fn encode_next_cursor(resolved_sort: &[SortSpec], row_sort_values: &[SqlParam]) -> String {
    debug_assert_eq!(resolved_sort.len(), row_sort_values.len());
    cursor::encode(row_sort_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::JoinSpec;

    fn sample_view() -> ViewNode {
        ViewNode {
            name: "TicketList".to_string(),
            source_table: "tickets".to_string(),
            fields: vec![
                ResolvedField {
                    name: "id".to_string(),
                    sql: "t.id".to_string(),
                    alias: "id".to_string(),
                    sql_type: "uuid".to_string(),
                    filterable: true,
                    sortable: true,
                },
                ResolvedField {
                    name: "subject".to_string(),
                    sql: "t.subject".to_string(),
                    alias: "subject".to_string(),
                    sql_type: "text".to_string(),
                    filterable: true,
                    sortable: true,
                },
                ResolvedField {
                    name: "author.name".to_string(),
                    sql: "j_author.name".to_string(),
                    alias: "author.name".to_string(),
                    sql_type: "text".to_string(),
                    filterable: false,
                    sortable: false,
                },
            ],
            joins: vec![JoinSpec {
                alias: "j_author".to_string(),
                table: "users".to_string(),
                on: "j_author.id = t.author_id".to_string(),
                kind: JoinKind::Left,
            }],
            filter_sql: None,
            filter_params: vec![],
            default_sort: vec![
                SortSpec { column: "t.created_at".to_string(), descending: true },
                SortSpec { column: "t.id".to_string(), descending: true },
            ],
            dependencies: vec!["Ticket".to_string(), "User".to_string()],
        }
    }

    #[test]
    fn builds_select_with_joins_and_default_sort() {
        let view = sample_view();
        let request = query_params::parse("").unwrap();
        let built = build(&view, &request).unwrap();

        assert!(built.sql.contains("SELECT t.id AS \"id\", t.subject AS \"subject\""));
        assert!(built.sql.contains("FROM tickets t LEFT JOIN users j_author ON j_author.id = t.author_id"));
        assert!(built.sql.contains("ORDER BY t.created_at DESC, t.id DESC"));
        assert!(built.sql.ends_with("LIMIT 51"));
        assert_eq!(built.limit, 50);
    }

    #[test]
    fn rejects_filter_on_unfilterable_field() {
        let view = sample_view();
        let request = query_params::parse("filter[author.name]=Ada").unwrap();
        let err = build(&view, &request).unwrap_err();
        assert_eq!(err.code(), "INVALID_FILTER");
    }

    #[test]
    fn rejects_sort_on_unsortable_field() {
        let view = sample_view();
        let request = query_params::parse("sort=author.name").unwrap();
        let err = build(&view, &request).unwrap_err();
        assert_eq!(err.code(), "INVALID_SORT");
    }

    #[test]
    fn client_filter_binds_a_coerced_param() {
        let view = sample_view();
        let request = query_params::parse("filter[subject]=Login+broken").unwrap();
        let built = build(&view, &request).unwrap();
        assert!(built.sql.contains("t.subject = $1"));
        assert_eq!(built.params, vec![SqlParam::Text("Login broken".to_string())]);
    }

    #[test]
    fn missing_declared_param_is_rejected() {
        let mut view = sample_view();
        view.filter_sql = Some("t.org_id = $1".to_string());
        view.filter_params = vec!["org_id".to_string()];
        let request = query_params::parse("").unwrap();
        let err = build(&view, &request).unwrap_err();
        assert_eq!(err.code(), "MISSING_PARAM");
    }

    #[test]
    fn count_query_has_no_order_or_limit() {
        let view = sample_view();
        let request = query_params::parse("").unwrap();
        let (sql, _params) = build_count(&view, &request).unwrap();
        assert!(sql.starts_with("SELECT COUNT(*) FROM tickets t"));
        assert!(!sql.contains("ORDER BY"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn cursor_on_uniform_descending_sort_uses_row_comparison() {
        let view = sample_view();
        let cursor_value = cursor::encode(&[
            SqlParam::Timestamp(chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&chrono::Utc)),
            SqlParam::Uuid(uuid::Uuid::nil()),
        ]);
        let request = query_params::parse(&format!("cursor={cursor_value}")).unwrap();
        let built = build(&view, &request).unwrap();
        assert!(built.sql.contains("(t.created_at, t.id) < "));
    }
}
