//! Lexer token types.

use serde::{Deserialize, Serialize};

use crate::position::Span;

/// Token kinds for the FORGE specification language.
///
/// The seven built-in type names (`string`, `int`, `float`, `bool`, `time`,
/// `uuid`, `file`) get their own `Ty*` kinds, distinct from the `Int`,
/// `Float`, `Str`, `Bool` kinds used for *literals* — `field: bool = true`
/// lexes `bool` as `TyBool` and `true` as `Bool`, never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Eof,
    Illegal,
    Comment,
    Newline,

    Ident,
    Int,
    Float,
    Str,
    Bool,

    // Declaration keywords
    KwApp,
    KwEntity,
    KwRelation,
    KwRule,
    KwAccess,
    KwAction,
    KwMessage,
    KwJob,
    KwHook,
    KwView,
    KwImperative,
    KwMigrate,
    KwTest,

    // Modifier / clause keywords
    KwMany,
    KwUnique,
    KwLength,
    KwDefault,
    KwEnum,
    KwForbid,
    KwRequire,
    KwIf,
    KwEmit,
    KwRead,
    KwWrite,
    KwBefore,
    KwAfter,
    KwCreate,
    KwUpdate,
    KwDelete,
    KwInput,
    KwNeeds,
    KwEffect,
    KwReturns,
    KwWhere,
    KwSource,
    KwFields,
    KwGiven,
    KwWhen,
    KwExpect,
    KwReject,
    KwFrom,
    KwTo,
    KwMap,
    KwAnd,
    KwOr,
    KwNot,
    KwIn,

    // Built-in type names
    TyString,
    TyInt,
    TyFloat,
    TyBool,
    TyTime,
    TyUuid,
    TyFile,

    // Operators and punctuation
    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Arrow,
    Dot,
    Colon,
    Comma,
    Semicolon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl TokenKind {
    /// Whether a path expression may use this token as a component after a
    /// `.` — keywords that double as lifecycle/operation names
    /// (`Ticket.update`, `Ticket.create`) are allowed here even though
    /// they're reserved words everywhere else.
    pub fn is_path_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::KwCreate
                | TokenKind::KwUpdate
                | TokenKind::KwDelete
                | TokenKind::KwBefore
                | TokenKind::KwAfter
        )
    }
}

/// A single lexed token: kind, literal source text, and position span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            literal: literal.into(),
            span,
        }
    }
}

/// Look up a scanned identifier against the keyword table. Returns `None`
/// for ordinary identifiers.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "app" => TokenKind::KwApp,
        "entity" => TokenKind::KwEntity,
        "relation" => TokenKind::KwRelation,
        "rule" => TokenKind::KwRule,
        "access" => TokenKind::KwAccess,
        "action" => TokenKind::KwAction,
        "message" => TokenKind::KwMessage,
        "job" => TokenKind::KwJob,
        "hook" => TokenKind::KwHook,
        "view" => TokenKind::KwView,
        "imperative" => TokenKind::KwImperative,
        "migrate" => TokenKind::KwMigrate,
        "test" => TokenKind::KwTest,

        "many" => TokenKind::KwMany,
        "unique" => TokenKind::KwUnique,
        "length" => TokenKind::KwLength,
        "default" => TokenKind::KwDefault,
        "enum" => TokenKind::KwEnum,
        "forbid" => TokenKind::KwForbid,
        "require" => TokenKind::KwRequire,
        "if" => TokenKind::KwIf,
        "emit" => TokenKind::KwEmit,
        "read" => TokenKind::KwRead,
        "write" => TokenKind::KwWrite,
        "before" => TokenKind::KwBefore,
        "after" => TokenKind::KwAfter,
        "create" => TokenKind::KwCreate,
        "update" => TokenKind::KwUpdate,
        "delete" => TokenKind::KwDelete,
        "input" => TokenKind::KwInput,
        "needs" => TokenKind::KwNeeds,
        "effect" => TokenKind::KwEffect,
        "returns" => TokenKind::KwReturns,
        "where" => TokenKind::KwWhere,
        "source" => TokenKind::KwSource,
        "fields" => TokenKind::KwFields,
        "given" => TokenKind::KwGiven,
        "when" => TokenKind::KwWhen,
        "expect" => TokenKind::KwExpect,
        "reject" => TokenKind::KwReject,
        "from" => TokenKind::KwFrom,
        "to" => TokenKind::KwTo,
        "map" => TokenKind::KwMap,
        "and" => TokenKind::KwAnd,
        "or" => TokenKind::KwOr,
        "not" => TokenKind::KwNot,
        "in" => TokenKind::KwIn,

        "true" | "false" => TokenKind::Bool,

        "string" => TokenKind::TyString,
        "int" => TokenKind::TyInt,
        "float" => TokenKind::TyFloat,
        "bool" => TokenKind::TyBool,
        "time" => TokenKind::TyTime,
        "uuid" => TokenKind::TyUuid,
        "file" => TokenKind::TyFile,

        _ => return None,
    })
}
