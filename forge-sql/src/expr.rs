//! WHERE/ORDER BY expression assembly over already-qualified column SQL.
//!
//! Every `column` parameter here is a string the planner already produced
//! (`t.subject`, `j_author.name`, ...) and is pasted in verbatim; there is
//! nothing left to escape because it never came from client input.

use crate::builder::SqlFragment;
use crate::param::SqlParam;

#[derive(Clone, Debug)]
pub struct Expr {
    fragment: SqlFragment,
}

impl Expr {
    pub fn from_fragment(fragment: SqlFragment) -> Self {
        Self { fragment }
    }

    pub fn eq(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " = ", value)
    }

    pub fn neq(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " <> ", value)
    }

    pub fn gt(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " > ", value)
    }

    pub fn gte(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " >= ", value)
    }

    pub fn lt(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " < ", value)
    }

    pub fn lte(column: &str, value: impl Into<SqlParam>) -> Self {
        Self::binary(column, " <= ", value)
    }

    fn binary(column: &str, op: &str, value: impl Into<SqlParam>) -> Self {
        let mut frag = SqlFragment::raw(column);
        frag.push(op);
        frag.push_param(value);
        Self { fragment: frag }
    }

    /// `column ILIKE '%' || $N || '%'`, per the `like` query operator's
    /// substring-match semantics.
    pub fn ilike_contains(column: &str, value: impl Into<SqlParam>) -> Self {
        let mut frag = SqlFragment::raw(column);
        frag.push(" ILIKE '%' || ");
        frag.push_param(value);
        frag.push(" || '%'");
        Self { fragment: frag }
    }

    pub fn is_null(column: &str) -> Self {
        Self {
            fragment: SqlFragment::raw(format!("{column} IS NULL")),
        }
    }

    pub fn is_not_null(column: &str) -> Self {
        Self {
            fragment: SqlFragment::raw(format!("{column} IS NOT NULL")),
        }
    }

    /// `column IN ($1, $2, ...)`; an empty `values` collapses to `FALSE`
    /// since no value can ever satisfy it.
    pub fn in_list(column: &str, values: Vec<SqlParam>) -> Self {
        if values.is_empty() {
            return Self {
                fragment: SqlFragment::raw("FALSE"),
            };
        }
        let mut frag = SqlFragment::raw(column);
        frag.push(" IN (");
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                frag.push(", ");
            }
            frag.push_param(value);
        }
        frag.push(")");
        Self { fragment: frag }
    }

    pub fn not(self) -> Self {
        let mut frag = SqlFragment::raw("NOT ");
        frag.append(self.fragment.parens());
        Self { fragment: frag }
    }

    pub fn and(self, other: Expr) -> Self {
        let mut frag = self.fragment.parens();
        frag.push(" AND ");
        frag.append(other.fragment.parens());
        Self { fragment: frag }
    }

    pub fn or(self, other: Expr) -> Self {
        let mut frag = self.fragment.parens();
        frag.push(" OR ");
        frag.append(other.fragment.parens());
        Self { fragment: frag }
    }

    /// `TRUE` for an empty list, matching `and`'s identity element.
    pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let frags: Vec<_> = exprs.into_iter().map(|e| e.fragment.parens()).collect();
        if frags.is_empty() {
            return Self {
                fragment: SqlFragment::raw("TRUE"),
            };
        }
        Self {
            fragment: SqlFragment::join(" AND ", frags),
        }
    }

    /// `FALSE` for an empty list, matching `or`'s identity element.
    pub fn or_all(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let frags: Vec<_> = exprs.into_iter().map(|e| e.fragment.parens()).collect();
        if frags.is_empty() {
            return Self {
                fragment: SqlFragment::raw("FALSE"),
            };
        }
        Self {
            fragment: SqlFragment::join(" OR ", frags),
        }
    }

    pub fn into_fragment(self) -> SqlFragment {
        self.fragment
    }

    pub fn sql(&self) -> &str {
        self.fragment.sql()
    }

    pub fn params(&self) -> &[SqlParam] {
        self.fragment.params()
    }
}

/// One `ORDER BY` term over an already-qualified column.
#[derive(Clone, Debug)]
pub struct OrderExpr {
    column: String,
    descending: bool,
}

impl OrderExpr {
    pub fn new(column: impl Into<String>, descending: bool) -> Self {
        Self {
            column: column.into(),
            descending,
        }
    }

    pub fn into_fragment(self) -> SqlFragment {
        let dir = if self.descending { " DESC" } else { " ASC" };
        SqlFragment::raw(format!("{}{dir}", self.column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_binds_one_param() {
        let expr = Expr::eq("t.status", "open");
        assert_eq!(expr.sql(), "t.status = $1");
        assert_eq!(expr.params().len(), 1);
    }

    #[test]
    fn in_list_of_zero_values_is_false() {
        let expr = Expr::in_list("t.id", vec![]);
        assert_eq!(expr.sql(), "FALSE");
    }

    #[test]
    fn and_all_of_zero_exprs_is_true() {
        assert_eq!(Expr::and_all(vec![]).sql(), "TRUE");
    }

    #[test]
    fn or_all_of_zero_exprs_is_false() {
        assert_eq!(Expr::or_all(vec![]).sql(), "FALSE");
    }

    #[test]
    fn order_expr_renders_direction() {
        assert_eq!(OrderExpr::new("t.created_at", true).into_fragment().sql(), "t.created_at DESC");
        assert_eq!(OrderExpr::new("t.id", false).into_fragment().sql(), "t.id ASC");
    }
}
