//! The core SQL assembly type: a string with `$N` placeholders, alongside
//! the parameter values those placeholders refer to.

use std::fmt::Write;

use crate::param::SqlParam;

#[derive(Clone, Debug, Default)]
pub struct SqlFragment {
    sql: String,
    params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already-valid SQL text with no parameters of its own.
    ///
    /// Only ever call this with text the planner produced (column/table/join
    /// expressions); never with a raw client-supplied string.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Push a parameter and its `$N` placeholder, `N` following whatever
    /// has already been pushed into this fragment.
    pub fn push_param(&mut self, value: impl Into<SqlParam>) -> &mut Self {
        let param_num = self.params.len() + 1;
        write!(self.sql, "${param_num}").unwrap();
        self.params.push(value.into());
        self
    }

    /// Append `other`, renumbering its placeholders to continue from this
    /// fragment's current parameter count.
    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        let offset = self.params.len();
        self.sql.push_str(&renumber_params(&other.sql, offset));
        self.params.extend(other.params);
        self
    }

    /// Append `other` after `sep`, unless either side is empty.
    pub fn append_sep(&mut self, sep: &str, other: SqlFragment) -> &mut Self {
        if !self.is_empty() && !other.is_empty() {
            self.push(sep);
        }
        self.append(other)
    }

    /// Join fragments with `sep`, skipping empty ones.
    pub fn join(sep: &str, fragments: impl IntoIterator<Item = SqlFragment>) -> Self {
        let mut result = Self::new();
        let mut first = true;
        for frag in fragments {
            if frag.is_empty() {
                continue;
            }
            if !first {
                result.push(sep);
            }
            result.append(frag);
            first = false;
        }
        result
    }

    pub fn parens(mut self) -> Self {
        self.sql = format!("({})", self.sql);
        self
    }

    pub fn build(self) -> (String, Vec<SqlParam>) {
        (self.sql, self.params)
    }
}

fn renumber_params(sql: &str, offset: usize) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }
        let mut num_str = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() {
                num_str.push(chars.next().unwrap());
            } else {
                break;
            }
        }
        match num_str.parse::<usize>() {
            Ok(num) => write!(result, "${}", num + offset).unwrap(),
            Err(_) => {
                result.push('$');
                result.push_str(&num_str);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_has_no_params() {
        let frag = SqlFragment::raw("t.id");
        assert_eq!(frag.sql(), "t.id");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn push_param_numbers_sequentially() {
        let mut frag = SqlFragment::new();
        frag.push("t.status = ");
        frag.push_param(SqlParam::Text("open".into()));
        assert_eq!(frag.sql(), "t.status = $1");
    }

    #[test]
    fn append_renumbers_the_appended_fragment() {
        let mut a = SqlFragment::new();
        a.push("a = ").push_param(SqlParam::Int(1));

        let mut b = SqlFragment::new();
        b.push("b = ").push_param(SqlParam::Int(2));

        a.append_sep(" AND ", b);
        assert_eq!(a.sql(), "a = $1 AND b = $2");
        assert_eq!(a.params().len(), 2);
    }

    #[test]
    fn join_skips_empty_fragments() {
        let frags = vec![SqlFragment::raw("a"), SqlFragment::new(), SqlFragment::raw("b")];
        let joined = SqlFragment::join(" AND ", frags);
        assert_eq!(joined.sql(), "a AND b");
    }
}
