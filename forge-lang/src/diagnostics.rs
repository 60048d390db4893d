//! Uniform diagnostic accumulator shared by every compiler stage.
//!
//! Every stage appends to the same [`Diagnostics`] channel instead of
//! aborting on the first problem: `Analyze`, `Normalize`, and `Plan` all
//! keep working on whatever didn't depend on the broken construct, so a
//! single run can surface more than one error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::position::Span;

/// Diagnostic severity. Only `Error` fails a compile (see §6 exit codes);
/// `Warning` is informational (e.g. a circular table dependency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable, short diagnostic codes, grouped by the pipeline stage that
/// raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Lexical
    ErrUnexpectedChar,
    ErrUnterminatedString,
    ErrUnterminatedComment,
    ErrInvalidEscape,
    // Syntactic
    ErrExpectedToken,
    ErrUnexpectedToken,
    ErrInvalidDeclarationStart,
    ErrInvalidExpressionStart,
    ErrInvalidPath,
    // Semantic
    ErrDuplicateName,
    ErrUnresolved,
    ErrTypeMismatch,
    ErrInvalidDefault,
    ErrUnknownRelation,
    ErrUnknownMessage,
    ErrUnknownAction,
    ErrUnknownJob,
    ErrInvalidHookTarget,
    // Normalization
    ErrInvalidConstraintValue,
    ErrUnsupportedType,
    // Planning
    WarnCircularTableDependency,
    ErrDeepViewPath,
}

impl DiagnosticCode {
    /// The stable string the CLI and any downstream tooling key off of.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ErrUnexpectedChar => "ErrUnexpectedChar",
            DiagnosticCode::ErrUnterminatedString => "ErrUnterminatedString",
            DiagnosticCode::ErrUnterminatedComment => "ErrUnterminatedComment",
            DiagnosticCode::ErrInvalidEscape => "ErrInvalidEscape",
            DiagnosticCode::ErrExpectedToken => "ErrExpectedToken",
            DiagnosticCode::ErrUnexpectedToken => "ErrUnexpectedToken",
            DiagnosticCode::ErrInvalidDeclarationStart => "ErrInvalidDeclarationStart",
            DiagnosticCode::ErrInvalidExpressionStart => "ErrInvalidExpressionStart",
            DiagnosticCode::ErrInvalidPath => "ErrInvalidPath",
            DiagnosticCode::ErrDuplicateName => "ErrDuplicateName",
            DiagnosticCode::ErrUnresolved => "ErrUnresolved",
            DiagnosticCode::ErrTypeMismatch => "ErrTypeMismatch",
            DiagnosticCode::ErrInvalidDefault => "ErrInvalidDefault",
            DiagnosticCode::ErrUnknownRelation => "ErrUnknownRelation",
            DiagnosticCode::ErrUnknownMessage => "ErrUnknownMessage",
            DiagnosticCode::ErrUnknownAction => "ErrUnknownAction",
            DiagnosticCode::ErrUnknownJob => "ErrUnknownJob",
            DiagnosticCode::ErrInvalidHookTarget => "ErrInvalidHookTarget",
            DiagnosticCode::ErrInvalidConstraintValue => "ErrInvalidConstraintValue",
            DiagnosticCode::ErrUnsupportedType => "ErrUnsupportedType",
            DiagnosticCode::WarnCircularTableDependency => "WarnCircularTableDependency",
            DiagnosticCode::ErrDeepViewPath => "ErrDeepViewPath",
        }
    }

    /// The severity a code carries unless a call site overrides it (only
    /// `WarnCircularTableDependency` is a downgrade-by-design; everything
    /// else defaults to error).
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticCode::WarnCircularTableDependency => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One diagnostic: a stable code, a severity, a human message, and the
/// source span it applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
            span,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        let mut d = Self::new(code, message, span);
        d.severity = Severity::Warning;
        d
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}[{}]: {}",
            self.span.filename,
            self.span.start.line,
            self.span.start.column,
            self.severity,
            self.code.as_str(),
            self.message
        )
    }
}

/// Append-only diagnostic accumulator for one compilation.
///
/// No cancellation, no cross-thread sharing: each compiled file owns one of
/// these for the lifetime of its run (see the Concurrency & Resource Model
/// section — multiple files may compile concurrently, but never share an
/// accumulator).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::new(code, message, span));
    }

    pub fn warning(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.push(Diagnostic::warning(code, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    /// Merge another diagnostics set in, preserving each side's original
    /// order (an ordered concatenation, not a re-sort).
    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.items.extend(iter);
    }
}
