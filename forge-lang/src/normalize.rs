//! Lower surface syntax to a canonical, SQL-friendly intermediate.
//!
//! The normalizer is deterministic: identical inputs yield byte-identical
//! outputs (all collections here are plain `Vec`s built in declaration
//! order, never a hash-ordered map).

use forge_core::Value;

use crate::analyze::Scope;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::parser::ast::*;

/// Map a surface type name to its SQL-friendly equivalent.
pub fn sql_type_name(name: &str) -> String {
    match name {
        "string" => "text",
        "int" => "integer",
        "float" => "double precision",
        "bool" => "boolean",
        "time" => "timestamptz",
        "uuid" => "uuid",
        "file" => "text",
        other => other,
    }
    .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedCompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl From<CompareOp> for NormalizedCompareOp {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Lt => NormalizedCompareOp::Lt,
            CompareOp::Le => NormalizedCompareOp::Le,
            CompareOp::Gt => NormalizedCompareOp::Gt,
            CompareOp::Ge => NormalizedCompareOp::Ge,
            CompareOp::Eq => NormalizedCompareOp::Eq,
            CompareOp::Ne => NormalizedCompareOp::Ne,
        }
    }
}

impl NormalizedCompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            NormalizedCompareOp::Lt => "<",
            NormalizedCompareOp::Le => "<=",
            NormalizedCompareOp::Gt => ">",
            NormalizedCompareOp::Ge => ">=",
            NormalizedCompareOp::Eq => "=",
            NormalizedCompareOp::Ne => "<>",
        }
    }
}

/// A normalized entity field: SQL type, nullability, the extracted
/// constraints, and a host-representable default.
#[derive(Debug, Clone)]
pub struct NormalizedField {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub length_constraint: Option<(NormalizedCompareOp, i64)>,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct NormalizedEntity {
    pub name: String,
    pub fields: Vec<NormalizedField>,
}

/// An expression lowered to CEL-like textual form, plus the ordered,
/// first-occurrence list of `param.<name>` references it contains.
#[derive(Debug, Clone, Default)]
pub struct CompiledExpr {
    pub cel: String,
    pub params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedRuleClause {
    pub kind: RuleClauseKind,
    pub condition: CompiledExpr,
    pub emit: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedRule {
    pub target_entity: String,
    pub target_operation: String,
    pub clauses: Vec<NormalizedRuleClause>,
}

#[derive(Debug, Clone)]
pub struct NormalizedAccess {
    pub entity: String,
    pub read: Option<CompiledExpr>,
    pub write: Option<CompiledExpr>,
}

#[derive(Debug, Clone)]
pub struct NormalizedSortTerm {
    pub path: Vec<String>,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct NormalizedView {
    pub name: String,
    pub source: String,
    pub fields: Vec<Vec<String>>,
    pub filter: Option<CompiledExpr>,
    pub sort: Vec<NormalizedSortTerm>,
}

#[derive(Debug, Clone)]
pub struct NormalizedNeeds {
    pub path: Vec<String>,
    pub where_expr: Option<CompiledExpr>,
}

#[derive(Debug, Clone)]
pub struct NormalizedJob {
    pub name: String,
    pub input_entity: String,
    pub needs: Option<NormalizedNeeds>,
    pub effect: Vec<String>,
    pub creates_entity: Option<String>,
}

/// The complete normalized output: desugared entities, relations, rules,
/// access, jobs, and views, ready for the planner.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFile {
    pub entities: Vec<NormalizedEntity>,
    pub relations: Vec<RelationDecl>,
    pub rules: Vec<NormalizedRule>,
    pub access: Vec<NormalizedAccess>,
    pub jobs: Vec<NormalizedJob>,
    pub views: Vec<NormalizedView>,
}

/// Compile a surface expression to its CEL-compatible textual form,
/// collecting `param.<name>` references in first-occurrence order.
pub fn compile_expr(expr: &Expr) -> CompiledExpr {
    let mut params = Vec::new();
    let cel = render_expr(expr, &mut params);
    CompiledExpr { cel, params }
}

fn push_param(name: String, params: &mut Vec<String>) {
    if !params.contains(&name) {
        params.push(name);
    }
}

fn render_expr(expr: &Expr, params: &mut Vec<String>) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Path(parts) => {
            if parts.first().map(String::as_str) == Some("param") && parts.len() == 2 {
                push_param(parts[1].clone(), params);
            }
            parts.join(".")
        }
        ExprKind::Int(n) => n.to_string(),
        ExprKind::Float(f) => f.to_string(),
        ExprKind::Str(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Unary { op, operand } => {
            let inner = render_expr(operand, params);
            match op {
                UnOp::Neg => format!("-{inner}"),
                UnOp::Not => format!("!{inner}"),
            }
        }
        ExprKind::Binary { left, op, right } => {
            let l = render_expr(left, params);
            let r = render_expr(right, params);
            let sym = match op {
                BinOp::Or => "||",
                BinOp::And => "&&",
                BinOp::Eq => "==",
                BinOp::Ne => "!=",
                BinOp::Lt => "<",
                BinOp::Gt => ">",
                BinOp::Le => "<=",
                BinOp::Ge => ">=",
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "/",
                BinOp::Mod => "%",
            };
            format!("{l} {sym} {r}")
        }
        ExprKind::In { left, right } => {
            let l = render_expr(left, params);
            let r = render_expr(right, params);
            format!("{l} in {r}")
        }
        ExprKind::Call { callee, args } => {
            let callee_str = render_expr(callee, params);
            let args_str: Vec<String> = args.iter().map(|a| render_expr(a, params)).collect();
            format!("{callee_str}({})", args_str.join(", "))
        }
        ExprKind::Grouped(inner) => format!("({})", render_expr(inner, params)),
    }
}

/// Translate a CEL-compatible condition string to a SQL predicate: `==`
/// becomes `=`, `&&`/`||` become `AND`/`OR`, `!` becomes `NOT `. Field
/// references and string/bool/number literals pass through unchanged
/// because the textual CEL form and SQL share the same literal syntax for
/// every operator this language supports.
pub fn cel_to_sql(cel: &str) -> String {
    let mut out = String::with_capacity(cel.len());
    let mut chars = cel.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push('\'');
            }
            '=' if chars.peek() == Some(&'=') => {
                chars.next();
                out.push('=');
            }
            '!' if chars.peek() == Some(&'=') => {
                chars.next();
                out.push_str("<>");
            }
            '!' => out.push_str("NOT "),
            '&' if chars.peek() == Some(&'&') => {
                chars.next();
                out.push_str("AND");
            }
            '|' if chars.peek() == Some(&'|') => {
                chars.next();
                out.push_str("OR");
            }
            other => out.push(other),
        }
    }
    // CEL string literals use `"`; SQL uses `'`. The delimiter swap above
    // already flips the quote characters; escaped quotes inside a CEL
    // string (`\"`) were produced by `render_expr` and need no further
    // translation since SQL string literals don't use backslash escapes.
    out
}

fn resolve_default(expr: &Expr, diagnostics: &mut Diagnostics) -> Option<Value> {
    match &expr.kind {
        ExprKind::Int(n) => Some(Value::Int(*n)),
        ExprKind::Float(f) => Some(Value::Float(*f)),
        ExprKind::Str(s) => Some(Value::Str(s.clone())),
        ExprKind::Bool(b) => Some(Value::Bool(*b)),
        ExprKind::Ident(name) => Some(Value::Str(name.clone())),
        ExprKind::Call { callee, args } if args.is_empty() => {
            if let ExprKind::Ident(name) = &callee.kind {
                Some(Value::Func(format!("{name}()")))
            } else {
                diagnostics.error(
                    DiagnosticCode::ErrInvalidDefault,
                    "default function call must be a bare identifier",
                    expr.span.clone(),
                );
                None
            }
        }
        _ => {
            diagnostics.error(
                DiagnosticCode::ErrInvalidConstraintValue,
                "default value is not a recognized literal or zero-arg function call",
                expr.span.clone(),
            );
            None
        }
    }
}

fn normalize_field(field: &FieldDecl, diagnostics: &mut Diagnostics) -> NormalizedField {
    let mut unique = false;
    let mut length_constraint = None;
    for constraint in &field.constraints {
        match constraint {
            Constraint::Unique(_) => unique = true,
            Constraint::Length(_, op, n) => length_constraint = Some(((*op).into(), *n)),
        }
    }

    let (sql_type, enum_values) = match &field.type_expr {
        TypeExpr::Named { name, .. } => (sql_type_name(name), None),
        TypeExpr::Enum { members, .. } => (String::new(), Some(members.clone())),
    };

    let default = field
        .default
        .as_ref()
        .and_then(|expr| resolve_default(expr, diagnostics));

    NormalizedField {
        name: field.name.clone(),
        sql_type,
        // The specification's worked examples emit every declared field as
        // `NOT NULL`; nullability isn't surfaced as its own surface-syntax
        // construct, so every field is non-nullable.
        nullable: false,
        unique,
        length_constraint,
        default,
        enum_values,
    }
}

fn normalize_entity(entity: &EntityDecl, diagnostics: &mut Diagnostics) -> NormalizedEntity {
    let fields = entity
        .fields
        .iter()
        .map(|f| normalize_field(f, diagnostics))
        .collect();
    NormalizedEntity {
        name: entity.name.clone(),
        fields,
    }
}

fn normalize_rule(rule: &RuleDecl) -> NormalizedRule {
    let clauses = rule
        .clauses
        .iter()
        .map(|clause| NormalizedRuleClause {
            kind: clause.kind,
            condition: compile_expr(&clause.condition),
            emit: clause.emit.clone(),
        })
        .collect();
    NormalizedRule {
        target_entity: rule.target_entity.clone(),
        target_operation: rule.target_operation.clone(),
        clauses,
    }
}

fn normalize_access(access: &AccessDecl) -> NormalizedAccess {
    NormalizedAccess {
        entity: access.entity.clone(),
        read: access.read.as_ref().map(compile_expr),
        write: access.write.as_ref().map(compile_expr),
    }
}

fn normalize_view(view: &ViewDecl) -> NormalizedView {
    NormalizedView {
        name: view.name.clone(),
        source: view.source.clone(),
        fields: view.fields.iter().map(|p| p.parts.clone()).collect(),
        filter: view.filter.as_ref().map(compile_expr),
        sort: view
            .sort
            .iter()
            .map(|s| NormalizedSortTerm {
                path: s.path.parts.clone(),
                descending: s.descending,
            })
            .collect(),
    }
}

fn normalize_job(job: &JobDecl) -> NormalizedJob {
    let needs = job.needs.as_ref().map(|n| NormalizedNeeds {
        path: n.path.parts.clone(),
        where_expr: n.where_expr.as_ref().map(compile_expr),
    });
    NormalizedJob {
        name: job.name.clone(),
        input_entity: job.input_entity.clone(),
        needs,
        effect: job.effect.parts.clone(),
        creates_entity: job.creates.as_ref().map(|c| c.target_entity.clone()),
    }
}

/// Normalize `file` against the scope produced by [`crate::analyze::analyze`].
pub fn normalize(file: &File, _scope: &Scope, diagnostics: &mut Diagnostics) -> NormalizedFile {
    let mut out = NormalizedFile::default();
    for decl in &file.decls {
        match decl {
            Decl::Entity(e) => out.entities.push(normalize_entity(e, diagnostics)),
            Decl::Relation(r) => out.relations.push(r.clone()),
            Decl::Rule(r) => out.rules.push(normalize_rule(r)),
            Decl::Access(a) => out.access.push(normalize_access(a)),
            Decl::Job(j) => out.jobs.push(normalize_job(j)),
            Decl::View(v) => out.views.push(normalize_view(v)),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::parser::parse;

    #[test]
    fn enum_default_resolves_to_string_value() {
        let (file, _) = parse(
            "entity Ticket { status: enum(open, closed) = open }",
            "t.forge",
        );
        let (scope, mut diags) = analyze(&file);
        let normalized = normalize(&file, &scope, &mut diags);
        assert!(!diags.has_errors());
        let field = &normalized.entities[0].fields[0];
        assert_eq!(field.enum_values.as_deref(), Some(&["open".to_string(), "closed".to_string()][..]));
        assert_eq!(field.default, Some(Value::Str("open".to_string())));
    }

    #[test]
    fn rule_condition_compiles_to_cel_and_sql() {
        let (file, _) = parse(
            "entity Ticket { status: string } rule Ticket.update { forbid if status == closed }",
            "t.forge",
        );
        let (scope, mut diags) = analyze(&file);
        let normalized = normalize(&file, &scope, &mut diags);
        let clause = &normalized.rules[0].clauses[0];
        assert_eq!(clause.condition.cel, "status == closed");
        assert_eq!(cel_to_sql(&clause.condition.cel), "status = closed");
    }

    #[test]
    fn view_filter_collects_params_in_order() {
        let (file, _) = parse(
            r#"view V { source: Ticket fields: subject where: param.b == param.a and param.b == param.c }"#,
            "t.forge",
        );
        let (scope, mut diags) = analyze(&file);
        let normalized = normalize(&file, &scope, &mut diags);
        assert_eq!(normalized.views[0].filter.as_ref().unwrap().params, vec!["b", "a", "c"]);
    }
}
