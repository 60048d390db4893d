//! Abstract syntax tree types.
//!
//! Declarations and expressions are both tagged unions with a shared
//! position field, per the "Polymorphism over declarations" design note —
//! sum types throughout, no inheritance hierarchy.

use serde::{Deserialize, Serialize};

use crate::position::Span;

/// The root AST node: an ordered list of top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub decls: Vec<Decl>,
}

/// A dotted path such as `org.members` or `Ticket.author`, with keyword
/// components allowed where the grammar calls for a lifecycle/operation
/// name (`Ticket.after_create`, `Ticket.update`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    pub span: Span,
    pub parts: Vec<String>,
}

impl Path {
    pub fn single(span: Span, part: impl Into<String>) -> Self {
        Self {
            span,
            parts: vec![part.into()],
        }
    }

    pub fn as_str(&self) -> String {
        self.parts.join(".")
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    App(AppDecl),
    Entity(EntityDecl),
    Relation(RelationDecl),
    Rule(RuleDecl),
    Access(AccessDecl),
    Action(ActionDecl),
    Message(MessageDecl),
    Job(JobDecl),
    Hook(HookDecl),
    View(ViewDecl),
    Webhook(WebhookDecl),
    Imperative(ImperativeDecl),
    Migrate(MigrateDecl),
    Test(TestDecl),
}

impl Decl {
    pub fn span(&self) -> &Span {
        match self {
            Decl::App(d) => &d.span,
            Decl::Entity(d) => &d.span,
            Decl::Relation(d) => &d.span,
            Decl::Rule(d) => &d.span,
            Decl::Access(d) => &d.span,
            Decl::Action(d) => &d.span,
            Decl::Message(d) => &d.span,
            Decl::Job(d) => &d.span,
            Decl::Hook(d) => &d.span,
            Decl::View(d) => &d.span,
            Decl::Webhook(d) => &d.span,
            Decl::Imperative(d) => &d.span,
            Decl::Migrate(d) => &d.span,
            Decl::Test(d) => &d.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDecl {
    pub span: Span,
    pub name: String,
    pub properties: Vec<(String, Expr)>,
}

/// A field's declared type: either a named type (`string`, `int`, or a
/// relation target entity used loosely) or an inline enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Named { span: Span, name: String },
    Enum { span: Span, members: Vec<String> },
}

impl TypeExpr {
    pub fn span(&self) -> &Span {
        match self {
            TypeExpr::Named { span, .. } => span,
            TypeExpr::Enum { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    Unique(Span),
    Length(Span, CompareOp, i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub span: Span,
    pub name: String,
    pub type_expr: TypeExpr,
    pub constraints: Vec<Constraint>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub span: Span,
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDecl {
    pub span: Span,
    pub source_entity: String,
    pub source_field: String,
    pub target_entity: String,
    pub many: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleClauseKind {
    Forbid,
    Require,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleClause {
    pub span: Span,
    pub kind: RuleClauseKind,
    pub condition: Expr,
    pub emit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDecl {
    pub span: Span,
    pub target_entity: String,
    pub target_operation: String,
    pub clauses: Vec<RuleClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessDecl {
    pub span: Span,
    pub entity: String,
    pub read: Option<Expr>,
    pub write: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecl {
    pub span: Span,
    pub name: String,
    pub properties: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDecl {
    pub span: Span,
    pub code: String,
    pub severity: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsClause {
    pub span: Span,
    pub path: Path,
    pub where_expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatesClause {
    pub span: Span,
    pub target_entity: String,
    pub mappings: Vec<(String, Expr)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDecl {
    pub span: Span,
    pub name: String,
    pub input_entity: String,
    pub needs: Option<NeedsClause>,
    pub effect: Path,
    pub creates: Option<CreatesClause>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookDecl {
    pub span: Span,
    pub target_entity: String,
    pub timing: String,
    pub operation: String,
    pub enqueue: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortTerm {
    pub span: Span,
    pub path: Path,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDecl {
    pub span: Span,
    pub name: String,
    pub source: String,
    pub fields: Vec<Path>,
    pub filter: Option<Expr>,
    pub sort: Vec<SortTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookDecl {
    pub span: Span,
    pub name: String,
    pub provider: String,
    pub events: Vec<String>,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImperativeDecl {
    pub span: Span,
    pub name: String,
    pub input_entity: String,
    pub returns: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrateDecl {
    pub span: Span,
    pub entity: String,
    pub version: String,
    pub from_type: TypeExpr,
    pub to_type: TypeExpr,
    pub mappings: Vec<(Expr, Expr)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub span: Span,
    pub operation: String,
    pub target: Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpectClause {
    Reject { span: Span, message: String },
    PathEq { span: Span, path: Path, value: Expr },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDecl {
    pub span: Span,
    pub target: Path,
    pub given: Vec<(Path, Expr)>,
    pub when: WhenClause,
    pub expect: ExpectClause,
}

/// Binary operators, in the precedence order the parser climbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// An expression, tagged with its full source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    Path(Vec<String>),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    In {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Grouped(Box<Expr>),
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }
}
