//! Recursive-descent declaration parser with Pratt-style expression parsing.
//!
//! Precedence, lowest to highest: `or` < `and` < `==`/`!=` <
//! `<`/`>`/`<=`/`>=`/`in` < `+`/`-` < `*`/`/`/`%` < prefix `not`/unary `-` <
//! call `(...)` < `.` path access. All binary operators are left-associative.

use super::ast::*;
use crate::diagnostics::{Diagnostics, DiagnosticCode};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::position::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Equals,
    Compare,
    Sum,
    Product,
    Prefix,
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::KwOr => Precedence::Or,
        TokenKind::KwAnd => Precedence::And,
        TokenKind::Eq | TokenKind::Ne => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge | TokenKind::KwIn => {
            Precedence::Compare
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        _ => Precedence::Lowest,
    }
}

/// Declaration-starting keywords; used both to dispatch and to find a
/// resynchronization point after a malformed declaration.
fn is_decl_start(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::KwApp
            | TokenKind::KwEntity
            | TokenKind::KwRelation
            | TokenKind::KwRule
            | TokenKind::KwAccess
            | TokenKind::KwAction
            | TokenKind::KwMessage
            | TokenKind::KwJob
            | TokenKind::KwHook
            | TokenKind::KwView
            | TokenKind::KwImperative
            | TokenKind::KwMigrate
            | TokenKind::KwTest
    )
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    filename: String,
    diagnostics: Diagnostics,
}

impl Parser {
    fn new(tokens: Vec<Token>, filename: String) -> Self {
        // The lexer retains COMMENT and NEWLINE tokens so a pretty-printer
        // can recover them; the parser itself skips both everywhere.
        let significant: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Newline))
            .collect();
        Self {
            tokens: significant,
            pos: 0,
            filename,
            diagnostics: Diagnostics::new(),
        }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn cur_span(&self) -> Span {
        self.cur().span.clone()
    }

    fn at_eof(&self) -> bool {
        self.cur_kind() == TokenKind::Eof
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.cur_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.bump())
        } else {
            self.diagnostics.error(
                DiagnosticCode::ErrExpectedToken,
                format!(
                    "expected {:?}, found {:?} ('{}')",
                    kind,
                    self.cur_kind(),
                    self.cur().literal
                ),
                self.cur_span(),
            );
            None
        }
    }

    fn expect_ident(&mut self) -> Option<String> {
        if self.check(TokenKind::Ident) {
            Some(self.bump().literal)
        } else {
            self.diagnostics.error(
                DiagnosticCode::ErrExpectedToken,
                format!("expected an identifier, found '{}'", self.cur().literal),
                self.cur_span(),
            );
            None
        }
    }

    fn expect_string(&mut self) -> Option<String> {
        if self.check(TokenKind::Str) {
            Some(self.bump().literal)
        } else {
            self.diagnostics.error(
                DiagnosticCode::ErrExpectedToken,
                "expected a string literal",
                self.cur_span(),
            );
            None
        }
    }

    fn expect_int(&mut self) -> Option<i64> {
        if self.check(TokenKind::Int) {
            let tok = self.bump();
            tok.literal.parse().ok()
        } else {
            self.diagnostics.error(
                DiagnosticCode::ErrExpectedToken,
                "expected an integer literal",
                self.cur_span(),
            );
            None
        }
    }

    /// Skip tokens until the next declaration-starting keyword (or EOF).
    fn recover_to_next_decl(&mut self) {
        while !self.at_eof() && !is_decl_start(self.cur_kind()) {
            self.bump();
        }
    }

    // ---------------------------------------------------------------
    // Paths and names
    // ---------------------------------------------------------------

    /// A word usable as a path component: any identifier, or one of the
    /// keywords that double as lifecycle/operation names.
    fn path_word(&mut self) -> Option<(String, Span)> {
        let tok = self.cur().clone();
        if tok.kind == TokenKind::Ident || tok.kind.is_path_keyword() {
            self.bump();
            Some((tok.literal, tok.span))
        } else {
            self.diagnostics.error(
                DiagnosticCode::ErrInvalidPath,
                format!("expected a path component, found '{}'", tok.literal),
                tok.span,
            );
            None
        }
    }

    fn parse_path(&mut self) -> Option<Path> {
        let (first, mut span) = self.path_word()?;
        let mut parts = vec![first];
        while self.eat(TokenKind::Dot) {
            let (part, part_span) = self.path_word()?;
            span = Span::new(self.filename.clone(), span.start, part_span.end);
            parts.push(part);
        }
        Some(Path { span, parts })
    }

    // ---------------------------------------------------------------
    // Expressions (Pratt / precedence climbing)
    // ---------------------------------------------------------------

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_expr_bp(Precedence::Lowest)
    }

    fn parse_expr_bp(&mut self, min_prec: Precedence) -> Option<Expr> {
        let mut left = self.parse_prefix()?;
        loop {
            let kind = self.cur_kind();
            let prec = precedence_of(kind);
            if prec <= min_prec || prec == Precedence::Lowest {
                break;
            }
            left = self.parse_infix(left, kind)?;
        }
        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expr> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_expr_bp(Precedence::Prefix)?;
                let span = Span::new(self.filename.clone(), tok.span.start, operand.span.end.clone());
                Some(Expr::new(
                    span,
                    ExprKind::Unary {
                        op: UnOp::Neg,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::KwNot => {
                self.bump();
                let operand = self.parse_expr_bp(Precedence::Prefix)?;
                let span = Span::new(self.filename.clone(), tok.span.start, operand.span.end.clone());
                Some(Expr::new(
                    span,
                    ExprKind::Unary {
                        op: UnOp::Not,
                        operand: Box::new(operand),
                    },
                ))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let span = Span::new(self.filename.clone(), tok.span.start, self.tokens[self.pos.saturating_sub(1)].span.end.clone());
                Some(Expr::new(span, ExprKind::Grouped(Box::new(inner))))
            }
            TokenKind::Int => {
                self.bump();
                let value = tok.literal.parse().unwrap_or(0);
                Some(Expr::new(tok.span, ExprKind::Int(value)))
            }
            TokenKind::Float => {
                self.bump();
                let value = tok.literal.parse().unwrap_or(0.0);
                Some(Expr::new(tok.span, ExprKind::Float(value)))
            }
            TokenKind::Str => {
                self.bump();
                Some(Expr::new(tok.span, ExprKind::Str(tok.literal)))
            }
            TokenKind::Bool => {
                self.bump();
                Some(Expr::new(tok.span, ExprKind::Bool(tok.literal == "true")))
            }
            TokenKind::Ident => self.parse_ident_or_path_or_call(),
            _ => {
                self.diagnostics.error(
                    DiagnosticCode::ErrInvalidExpressionStart,
                    format!("expected an expression, found '{}'", tok.literal),
                    tok.span,
                );
                None
            }
        }
    }

    fn parse_ident_or_path_or_call(&mut self) -> Option<Expr> {
        let first = self.bump();
        let mut parts = vec![first.literal.clone()];
        let mut end = first.span.end;
        while self.check(TokenKind::Dot) {
            self.bump();
            let (part, part_span) = self.path_word()?;
            parts.push(part);
            end = part_span.end;
        }
        let span = Span::new(self.filename.clone(), first.span.start, end);

        if self.check(TokenKind::LParen) {
            self.bump();
            let mut args = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            let close = self.expect(TokenKind::RParen)?;
            let callee_kind = if parts.len() == 1 {
                ExprKind::Ident(parts[0].clone())
            } else {
                ExprKind::Path(parts)
            };
            let callee = Expr::new(span.clone(), callee_kind);
            let full_span = Span::new(self.filename.clone(), span.start, close.span.end);
            return Some(Expr::new(
                full_span,
                ExprKind::Call {
                    callee: Box::new(callee),
                    args,
                },
            ));
        }

        if parts.len() == 1 {
            Some(Expr::new(span, ExprKind::Ident(parts.into_iter().next().unwrap())))
        } else {
            Some(Expr::new(span, ExprKind::Path(parts)))
        }
    }

    fn parse_infix(&mut self, left: Expr, kind: TokenKind) -> Option<Expr> {
        let prec = precedence_of(kind);
        self.bump();
        if kind == TokenKind::KwIn {
            let right = self.parse_expr_bp(prec)?;
            let span = Span::new(self.filename.clone(), left.span.start.clone(), right.span.end.clone());
            return Some(Expr::new(
                span,
                ExprKind::In {
                    left: Box::new(left),
                    right: Box::new(right),
                },
            ));
        }
        let op = match kind {
            TokenKind::KwOr => BinOp::Or,
            TokenKind::KwAnd => BinOp::And,
            TokenKind::Eq => BinOp::Eq,
            TokenKind::Ne => BinOp::Ne,
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            _ => unreachable!("precedence_of only returns > Lowest for handled kinds"),
        };
        let right = self.parse_expr_bp(prec)?;
        let span = Span::new(self.filename.clone(), left.span.start.clone(), right.span.end.clone());
        Some(Expr::new(
            span,
            ExprKind::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        ))
    }

    // ---------------------------------------------------------------
    // Types and constraints
    // ---------------------------------------------------------------

    fn parse_type(&mut self) -> Option<TypeExpr> {
        let tok = self.cur().clone();
        match tok.kind {
            TokenKind::KwEnum => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let mut members = Vec::new();
                loop {
                    members.push(self.expect_ident()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let close = self.expect(TokenKind::RParen)?;
                let span = Span::new(self.filename.clone(), tok.span.start, close.span.end);
                Some(TypeExpr::Enum { span, members })
            }
            TokenKind::Ident
            | TokenKind::TyString
            | TokenKind::TyInt
            | TokenKind::TyFloat
            | TokenKind::TyBool
            | TokenKind::TyTime
            | TokenKind::TyUuid
            | TokenKind::TyFile => {
                self.bump();
                Some(TypeExpr::Named {
                    span: tok.span,
                    name: tok.literal,
                })
            }
            _ => {
                self.diagnostics.error(
                    DiagnosticCode::ErrExpectedToken,
                    format!("expected a type, found '{}'", tok.literal),
                    tok.span,
                );
                None
            }
        }
    }

    fn parse_compare_op(&mut self) -> Option<CompareOp> {
        let tok = self.cur().clone();
        let op = match tok.kind {
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::Le => CompareOp::Le,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::Ge => CompareOp::Ge,
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            _ => {
                self.diagnostics.error(
                    DiagnosticCode::ErrExpectedToken,
                    "expected a comparison operator",
                    tok.span,
                );
                return None;
            }
        };
        self.bump();
        Some(op)
    }

    fn parse_field(&mut self) -> Option<FieldDecl> {
        let start = self.cur_span();
        let name = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let type_expr = self.parse_type()?;

        let mut constraints = Vec::new();
        loop {
            match self.cur_kind() {
                TokenKind::KwUnique => {
                    let span = self.bump().span;
                    constraints.push(Constraint::Unique(span));
                }
                TokenKind::KwLength => {
                    let span = self.bump().span;
                    let op = self.parse_compare_op()?;
                    let n = self.expect_int()?;
                    constraints.push(Constraint::Length(span, op, n));
                }
                _ => break,
            }
        }

        let default = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let end = default
            .as_ref()
            .map(|e| e.span.end.clone())
            .unwrap_or_else(|| type_expr.span().end.clone());
        let span = Span::new(self.filename.clone(), start.start, end);
        Some(FieldDecl {
            span,
            name,
            type_expr,
            constraints,
            default,
        })
    }

    // ---------------------------------------------------------------
    // Declarations
    // ---------------------------------------------------------------

    fn parse_app(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'app'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let key = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            properties.push((key, value));
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::App(AppDecl {
            span,
            name,
            properties,
        }))
    }

    fn parse_entity(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'entity'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            fields.push(self.parse_field()?);
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Entity(EntityDecl { span, name, fields }))
    }

    fn parse_relation(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'relation'
        let source_entity = self.expect_ident()?;
        self.expect(TokenKind::Dot)?;
        let source_field = self.expect_ident()?;
        self.expect(TokenKind::Arrow)?;
        let target_entity = self.expect_ident()?;
        let many = self.eat(TokenKind::KwMany);
        let end = self.tokens[self.pos.saturating_sub(1)].span.end.clone();
        let span = Span::new(self.filename.clone(), start.start, end);
        Some(Decl::Relation(RelationDecl {
            span,
            source_entity,
            source_field,
            target_entity,
            many,
        }))
    }

    fn parse_rule(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'rule'
        let target_entity = self.expect_ident()?;
        self.expect(TokenKind::Dot)?;
        let (target_operation, _) = self.path_word()?;
        self.expect(TokenKind::LBrace)?;
        let mut clauses = Vec::new();
        while matches!(self.cur_kind(), TokenKind::KwForbid | TokenKind::KwRequire) {
            let clause_start = self.cur_span();
            let kind = if self.eat(TokenKind::KwForbid) {
                RuleClauseKind::Forbid
            } else {
                self.bump();
                RuleClauseKind::Require
            };
            self.expect(TokenKind::KwIf)?;
            let condition = self.parse_expr()?;
            let emit = if self.eat(TokenKind::KwEmit) {
                Some(self.expect_ident()?)
            } else {
                None
            };
            let end = self.tokens[self.pos.saturating_sub(1)].span.end.clone();
            let span = Span::new(self.filename.clone(), clause_start.start, end);
            clauses.push(RuleClause {
                span,
                kind,
                condition,
                emit,
            });
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Rule(RuleDecl {
            span,
            target_entity,
            target_operation,
            clauses,
        }))
    }

    fn parse_access(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'access'
        let entity = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut read = None;
        let mut write = None;
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            if self.eat(TokenKind::KwRead) {
                self.expect(TokenKind::Colon)?;
                read = Some(self.parse_expr()?);
            } else if self.eat(TokenKind::KwWrite) {
                self.expect(TokenKind::Colon)?;
                write = Some(self.parse_expr()?);
            } else {
                self.diagnostics.error(
                    DiagnosticCode::ErrUnexpectedToken,
                    "expected 'read' or 'write'",
                    self.cur_span(),
                );
                return None;
            }
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Access(AccessDecl {
            span,
            entity,
            read,
            write,
        }))
    }

    fn parse_action(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'action'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut properties = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let (key, _) = self.path_word()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            properties.push((key, value));
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Action(ActionDecl {
            span,
            name,
            properties,
        }))
    }

    fn parse_message(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'message'
        let code = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut severity = String::from("error");
        let mut text = String::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let (key, _) = self.path_word()?;
            self.expect(TokenKind::Colon)?;
            match key.as_str() {
                "severity" => severity = self.expect_ident()?,
                "text" => text = self.expect_string()?,
                _ => {
                    self.diagnostics.error(
                        DiagnosticCode::ErrUnexpectedToken,
                        format!("unknown message property '{key}'"),
                        self.cur_span(),
                    );
                    let _ = self.parse_expr();
                }
            }
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Message(MessageDecl {
            span,
            code,
            severity,
            text,
        }))
    }

    fn parse_job(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'job'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::KwInput)?;
        self.expect(TokenKind::Colon)?;
        let input_entity = self.expect_ident()?;

        let mut needs = None;
        if self.eat(TokenKind::KwNeeds) {
            let needs_start = self.cur_span();
            self.expect(TokenKind::Colon)?;
            let path = self.parse_path()?;
            let where_expr = if self.eat(TokenKind::KwWhere) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let end = self.tokens[self.pos.saturating_sub(1)].span.end.clone();
            needs = Some(NeedsClause {
                span: Span::new(self.filename.clone(), needs_start.start, end),
                path,
                where_expr,
            });
        }

        self.expect(TokenKind::KwEffect)?;
        self.expect(TokenKind::Colon)?;
        let effect = self.parse_path()?;

        let mut creates = None;
        if self.eat(TokenKind::KwCreate) {
            let creates_start = self.cur_span();
            self.expect(TokenKind::Colon)?;
            let target_entity = self.expect_ident()?;
            self.expect(TokenKind::LBrace)?;
            let mut mappings = Vec::new();
            while !self.check(TokenKind::RBrace) && !self.at_eof() {
                let key = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expr()?;
                mappings.push((key, value));
            }
            let close = self.expect(TokenKind::RBrace)?;
            creates = Some(CreatesClause {
                span: Span::new(self.filename.clone(), creates_start.start, close.span.end),
                target_entity,
                mappings,
            });
        }

        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Job(JobDecl {
            span,
            name,
            input_entity,
            needs,
            effect,
            creates,
        }))
    }

    fn parse_hook(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'hook'
        let target_entity = self.expect_ident()?;
        self.expect(TokenKind::Dot)?;
        // `before_create`/`after_update`/etc. lexes as one underscore-joined
        // word, never as separate `before`/`after` keyword tokens.
        let (word, word_span) = self.path_word()?;
        let (timing, operation) = match word.split_once('_') {
            Some((timing, operation))
                if matches!(timing, "before" | "after")
                    && matches!(operation, "create" | "update" | "delete") =>
            {
                (timing.to_string(), operation.to_string())
            }
            _ => {
                self.diagnostics.error(
                    DiagnosticCode::ErrInvalidHookTarget,
                    "hook target must be '(before|after)_(create|update|delete)'",
                    word_span,
                );
                return None;
            }
        };
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::KwEmit)?;
        self.expect(TokenKind::Colon)?;
        let mut enqueue = vec![self.expect_ident()?];
        while self.eat(TokenKind::Comma) {
            enqueue.push(self.expect_ident()?);
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Hook(HookDecl {
            span,
            target_entity,
            timing,
            operation,
            enqueue,
        }))
    }

    fn parse_view(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'view'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::KwSource)?;
        self.expect(TokenKind::Colon)?;
        let source = self.expect_ident()?;

        self.expect(TokenKind::KwFields)?;
        self.expect(TokenKind::Colon)?;
        let mut fields = vec![self.parse_path()?];
        while self.eat(TokenKind::Comma) {
            fields.push(self.parse_path()?);
        }

        let mut filter = None;
        if self.eat(TokenKind::KwWhere) {
            self.expect(TokenKind::Colon)?;
            filter = Some(self.parse_expr()?);
        }

        let mut sort = Vec::new();
        if self.check(TokenKind::Ident) && self.cur().literal == "sort" {
            self.bump();
            self.expect(TokenKind::Colon)?;
            loop {
                let term_start = self.cur_span();
                let descending = self.eat(TokenKind::Minus);
                let path = self.parse_path()?;
                let end = path.span.end.clone();
                sort.push(SortTerm {
                    span: Span::new(self.filename.clone(), term_start.start, end),
                    path,
                    descending,
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::View(ViewDecl {
            span,
            name,
            source,
            fields,
            filter,
            sort,
        }))
    }

    fn parse_webhook(&mut self) -> Option<Decl> {
        // `webhook` is not in the reserved keyword table (the grammar lists
        // it as a declaration kind but the lexer has no dedicated keyword
        // for it), so it is recognized as an identifier at decl-start.
        let start = self.bump().span; // 'webhook' (Ident)
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut provider = String::new();
        let mut events = Vec::new();
        let mut action = String::new();
        while !self.check(TokenKind::RBrace) && !self.at_eof() {
            let (key, _) = self.path_word()?;
            self.expect(TokenKind::Colon)?;
            match key.as_str() {
                "provider" => provider = self.expect_ident()?,
                "events" => {
                    events.push(self.expect_ident()?);
                    while self.eat(TokenKind::Comma) {
                        events.push(self.expect_ident()?);
                    }
                }
                "action" => action = self.expect_ident()?,
                _ => {
                    let _ = self.parse_expr();
                }
            }
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Webhook(WebhookDecl {
            span,
            name,
            provider,
            events,
            action,
        }))
    }

    fn parse_imperative(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'imperative'
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::KwInput)?;
        self.expect(TokenKind::Colon)?;
        let input_entity = self.expect_ident()?;
        self.expect(TokenKind::KwReturns)?;
        self.expect(TokenKind::Colon)?;
        let returns = self.expect_ident()?;
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Imperative(ImperativeDecl {
            span,
            name,
            input_entity,
            returns,
        }))
    }

    fn parse_migrate(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'migrate'
        let entity = self.expect_ident()?;
        self.expect(TokenKind::Dot)?;
        let version = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        self.expect(TokenKind::KwFrom)?;
        self.expect(TokenKind::Colon)?;
        let from_type = self.parse_type()?;
        self.expect(TokenKind::KwTo)?;
        self.expect(TokenKind::Colon)?;
        let to_type = self.parse_type()?;
        let mut mappings = Vec::new();
        if self.eat(TokenKind::KwMap) {
            self.expect(TokenKind::Colon)?;
            loop {
                let from_val = self.parse_expr()?;
                self.expect(TokenKind::Arrow)?;
                let to_val = self.parse_expr()?;
                mappings.push((from_val, to_val));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Migrate(MigrateDecl {
            span,
            entity,
            version,
            from_type,
            to_type,
            mappings,
        }))
    }

    fn parse_test(&mut self) -> Option<Decl> {
        let start = self.bump().span; // 'test'
        let target = self.parse_path()?;
        self.expect(TokenKind::LBrace)?;

        let mut given = Vec::new();
        while self.check(TokenKind::KwGiven) {
            self.bump();
            let path = self.parse_path()?;
            self.expect(TokenKind::Assign)?;
            let value = self.parse_expr()?;
            given.push((path, value));
        }

        self.expect(TokenKind::KwWhen)?;
        let when_start = self.cur_span();
        let (operation, _) = self.path_word()?;
        self.expect(TokenKind::Colon)?;
        let when_target = self.parse_path()?;
        let when = WhenClause {
            span: Span::new(self.filename.clone(), when_start.start, when_target.span.end.clone()),
            operation,
            target: when_target,
        };

        self.expect(TokenKind::KwExpect)?;
        let expect_start = self.cur_span();
        let expect = if self.eat(TokenKind::KwReject) {
            let message = self.expect_ident()?;
            ExpectClause::Reject {
                span: Span::new(self.filename.clone(), expect_start.start, self.tokens[self.pos.saturating_sub(1)].span.end.clone()),
                message,
            }
        } else {
            let path = self.parse_path()?;
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expr()?;
            ExpectClause::PathEq {
                span: Span::new(self.filename.clone(), expect_start.start, value.span.end.clone()),
                path,
                value,
            }
        };

        let close = self.expect(TokenKind::RBrace)?;
        let span = Span::new(self.filename.clone(), start.start, close.span.end);
        Some(Decl::Test(TestDecl {
            span,
            target,
            given,
            when,
            expect,
        }))
    }

    fn parse_decl(&mut self) -> Option<Decl> {
        match self.cur_kind() {
            TokenKind::KwApp => self.parse_app(),
            TokenKind::KwEntity => self.parse_entity(),
            TokenKind::KwRelation => self.parse_relation(),
            TokenKind::KwRule => self.parse_rule(),
            TokenKind::KwAccess => self.parse_access(),
            TokenKind::KwAction => self.parse_action(),
            TokenKind::KwMessage => self.parse_message(),
            TokenKind::KwJob => self.parse_job(),
            TokenKind::KwHook => self.parse_hook(),
            TokenKind::KwView => self.parse_view(),
            TokenKind::KwImperative => self.parse_imperative(),
            TokenKind::KwMigrate => self.parse_migrate(),
            TokenKind::KwTest => self.parse_test(),
            TokenKind::Ident if self.cur().literal == "webhook" => self.parse_webhook(),
            _ => {
                self.diagnostics.error(
                    DiagnosticCode::ErrInvalidDeclarationStart,
                    format!("expected a top-level declaration, found '{}'", self.cur().literal),
                    self.cur_span(),
                );
                None
            }
        }
    }

    fn parse_file(&mut self) -> File {
        let mut decls = Vec::new();
        while !self.at_eof() {
            match self.parse_decl() {
                Some(decl) => decls.push(decl),
                None => self.recover_to_next_decl(),
            }
        }
        File { decls }
    }
}

/// Parse `source` into a [`File`], accumulating both lexical and syntactic
/// diagnostics. Always returns a file, even when diagnostics are non-empty.
pub fn parse(source: &str, filename: impl Into<String>) -> (File, Diagnostics) {
    let filename = filename.into();
    let (tokens, lex_diagnostics) = tokenize(source, filename.clone());
    let mut parser = Parser::new(tokens, filename);
    let file = parser.parse_file();
    let mut diagnostics = lex_diagnostics;
    diagnostics.merge(parser.diagnostics);
    (file, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_entity() {
        let (file, diags) = parse("entity Ticket { subject: string }", "t.forge");
        assert!(!diags.has_errors());
        assert_eq!(file.decls.len(), 1);
        match &file.decls[0] {
            Decl::Entity(e) => {
                assert_eq!(e.name, "Ticket");
                assert_eq!(e.fields.len(), 1);
                assert_eq!(e.fields[0].name, "subject");
            }
            _ => panic!("expected entity"),
        }
    }

    #[test]
    fn parses_enum_default() {
        let (file, diags) = parse(
            "entity Ticket { status: enum(open, closed) = open }",
            "t.forge",
        );
        assert!(!diags.has_errors());
        match &file.decls[0] {
            Decl::Entity(e) => {
                assert!(matches!(e.fields[0].type_expr, TypeExpr::Enum { .. }));
                assert!(e.fields[0].default.is_some());
            }
            _ => panic!("expected entity"),
        }
    }

    #[test]
    fn expression_precedence_or_and_eq() {
        let (file, diags) = parse(
            "rule Ticket.update { forbid if a or b and c == d }",
            "t.forge",
        );
        assert!(!diags.has_errors());
        let Decl::Rule(rule) = &file.decls[0] else {
            panic!("expected rule");
        };
        let cond = &rule.clauses[0].condition;
        let ExprKind::Binary { left, op: BinOp::Or, right } = &cond.kind else {
            panic!("root should be `or`, got {:?}", cond.kind);
        };
        assert!(matches!(left.kind, ExprKind::Ident(_)));
        let ExprKind::Binary { op: BinOp::And, right: and_right, .. } = &right.kind else {
            panic!("right of `or` should be `and`");
        };
        assert!(matches!(and_right.kind, ExprKind::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn recovers_after_bad_declaration_and_keeps_parsing() {
        let src = "entity {{ broken\nentity Ok { x: int }";
        let (file, diags) = parse(src, "t.forge");
        assert!(diags.has_errors());
        assert!(file.decls.iter().any(|d| matches!(d, Decl::Entity(e) if e.name == "Ok")));
    }

    #[test]
    fn relation_with_many() {
        let (file, diags) = parse("relation Ticket.watchers -> User many", "t.forge");
        assert!(!diags.has_errors());
        let Decl::Relation(r) = &file.decls[0] else {
            panic!("expected relation");
        };
        assert!(r.many);
        assert_eq!(r.target_entity, "User");
    }
}
