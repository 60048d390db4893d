//! FORGE Language - Compiler Pipeline
//!
//! Lexer, parser, analyzer, normalizer, planner, and emitter for the FORGE
//! specification language: a declarative DSL for defining web backends as
//! entities, relations, rules, access policies, actions, jobs, hooks, views,
//! and tests.
//!
//! Architecture:
//! ```text
//! Source (.forge file)
//!     ↓
//! Lexer (tokenize)          -> Vec<Token>, Diagnostics
//!     ↓
//! Parser (build AST)        -> File, Diagnostics
//!     ↓
//! Analyzer (resolve/check)  -> Scope, Diagnostics
//!     ↓
//! Normalizer (lower to IR)  -> normalize::Program, Diagnostics
//!     ↓
//! Planner (produce Plan)    -> forge_core::Plan, Diagnostics
//!     ↓
//! Emitter (render artifacts) -> JSON / SQL / SDK text
//! ```

pub mod analyze;
pub mod diagnostics;
pub mod emit;
pub mod lexer;
pub mod normalize;
pub mod parser;
pub mod plan;
pub mod position;
pub mod printer;

pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, Severity};
pub use emit::{emit, EmitOutput};
pub use plan::plan;
pub use position::{Position, Span};
pub use printer::print_file;

/// Run the full pipeline — lex, parse, analyze, normalize, plan, emit — on
/// a single source file. Returns the compiled artifacts and the merged
/// diagnostics from every stage, in stage order.
pub fn compile(source: &str, filename: impl Into<String>, version: impl Into<String>) -> (EmitOutput, Diagnostics) {
    let (file, mut diagnostics) = parser::parse(source, filename);
    let (scope, analyze_diagnostics) = analyze::analyze(&file);
    diagnostics.merge(analyze_diagnostics);
    let normalized = normalize::normalize(&file, &scope, &mut diagnostics);
    let plan = plan::plan(&scope, &normalized, version, &mut diagnostics);
    let (output, emit_diagnostics) = emit::emit(&plan);
    diagnostics.merge(emit_diagnostics);
    (output, diagnostics)
}
