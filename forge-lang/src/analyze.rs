//! Scope construction, reference resolution, and type checks.
//!
//! Mirrors the seven-step contract: collect names, validate relations,
//! validate rule/access expressions, validate defaults, validate hooks,
//! validate jobs, validate tests. The analyzer never mutates the AST; its
//! output is a read-only [`Scope`].

use std::collections::BTreeMap;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::parser::ast::*;

/// The built-in type names recognized everywhere a `TypeExpr::Named` is
/// expected outside of an inline `enum(...)`.
const BUILTIN_TYPES: &[&str] = &["string", "int", "float", "bool", "time", "uuid", "file"];

/// Ambient ally-field names available on `user` without further checking —
/// the analyzer resolves the `user` root but doesn't chase its shape deeper
/// than the guaranteed `id`/`role` fields.
const USER_FIELDS: &[&str] = &["id", "role"];

/// Read-only name tables produced by a successful (or partially successful)
/// analysis, one collection per declaration kind the later pipeline stages
/// need to resolve names against.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub app: Option<AppDecl>,
    pub entities: BTreeMap<String, EntityDecl>,
    /// Keyed by `Entity.field`.
    pub relations: BTreeMap<String, RelationDecl>,
    /// Keyed by `Entity.operation`.
    pub rules: BTreeMap<String, RuleDecl>,
    /// Keyed by entity name.
    pub access: BTreeMap<String, AccessDecl>,
    pub actions: BTreeMap<String, ActionDecl>,
    pub messages: BTreeMap<String, MessageDecl>,
    pub jobs: BTreeMap<String, JobDecl>,
    pub hooks: Vec<HookDecl>,
    pub views: BTreeMap<String, ViewDecl>,
    pub imperatives: BTreeMap<String, ImperativeDecl>,
    /// Keyed by `Entity.version`.
    pub migrates: BTreeMap<String, MigrateDecl>,
    pub tests: Vec<TestDecl>,
}

impl Scope {
    /// Relations whose source entity is `entity`, keyed by field name.
    pub fn relations_of(&self, entity: &str) -> BTreeMap<&str, &RelationDecl> {
        self.relations
            .iter()
            .filter(|(_, r)| r.source_entity == entity)
            .map(|(_, r)| (r.source_field.as_str(), r))
            .collect()
    }
}

struct Collector<'a> {
    scope: Scope,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Collector<'a> {
    fn insert_unique<V>(
        map: &mut BTreeMap<String, V>,
        key: String,
        value: V,
        span: &crate::position::Span,
        diagnostics: &mut Diagnostics,
    ) {
        if map.contains_key(&key) {
            diagnostics.error(
                DiagnosticCode::ErrDuplicateName,
                format!("duplicate declaration: '{key}'"),
                span.clone(),
            );
            return;
        }
        map.insert(key, value);
    }

    fn collect(&mut self, file: &File) {
        for decl in &file.decls {
            match decl.clone() {
                Decl::App(d) => {
                    if self.scope.app.is_some() {
                        self.diagnostics.error(
                            DiagnosticCode::ErrDuplicateName,
                            "duplicate 'app' declaration",
                            d.span.clone(),
                        );
                    } else {
                        self.scope.app = Some(d);
                    }
                }
                Decl::Entity(d) => {
                    Self::insert_unique(
                        &mut self.scope.entities,
                        d.name.clone(),
                        d,
                        decl.span(),
                        self.diagnostics,
                    );
                }
                Decl::Relation(d) => {
                    let key = format!("{}.{}", d.source_entity, d.source_field);
                    Self::insert_unique(&mut self.scope.relations, key, d, decl.span(), self.diagnostics);
                }
                Decl::Rule(d) => {
                    let key = format!("{}.{}", d.target_entity, d.target_operation);
                    Self::insert_unique(&mut self.scope.rules, key, d, decl.span(), self.diagnostics);
                }
                Decl::Access(d) => {
                    Self::insert_unique(
                        &mut self.scope.access,
                        d.entity.clone(),
                        d,
                        decl.span(),
                        self.diagnostics,
                    );
                }
                Decl::Action(d) => {
                    Self::insert_unique(
                        &mut self.scope.actions,
                        d.name.clone(),
                        d,
                        decl.span(),
                        self.diagnostics,
                    );
                }
                Decl::Message(d) => {
                    Self::insert_unique(
                        &mut self.scope.messages,
                        d.code.clone(),
                        d,
                        decl.span(),
                        self.diagnostics,
                    );
                }
                Decl::Job(d) => {
                    Self::insert_unique(&mut self.scope.jobs, d.name.clone(), d, decl.span(), self.diagnostics);
                }
                Decl::Hook(d) => self.scope.hooks.push(d),
                Decl::View(d) => {
                    Self::insert_unique(&mut self.scope.views, d.name.clone(), d, decl.span(), self.diagnostics);
                }
                Decl::Webhook(_) => {
                    // Webhooks are scoped purely for completeness's sake by
                    // the emitter's artifact pass-through; the planner does
                    // not resolve their `action` reference at analyze time
                    // because webhooks are entirely provider-driven.
                }
                Decl::Imperative(d) => {
                    Self::insert_unique(
                        &mut self.scope.imperatives,
                        d.name.clone(),
                        d,
                        decl.span(),
                        self.diagnostics,
                    );
                }
                Decl::Migrate(d) => {
                    let key = format!("{}.{}", d.entity, d.version);
                    Self::insert_unique(&mut self.scope.migrates, key, d, decl.span(), self.diagnostics);
                }
                Decl::Test(d) => self.scope.tests.push(d),
            }
        }
    }
}

fn validate_relations(scope: &Scope, diagnostics: &mut Diagnostics) {
    for relation in scope.relations.values() {
        if !scope.entities.contains_key(&relation.source_entity) {
            diagnostics.error(
                DiagnosticCode::ErrUnknownRelation,
                format!(
                    "relation source entity '{}' is not declared",
                    relation.source_entity
                ),
                relation.span.clone(),
            );
            continue;
        }
        if !scope.entities.contains_key(&relation.target_entity) {
            diagnostics.error(
                DiagnosticCode::ErrUnknownRelation,
                format!(
                    "relation target entity '{}' is not declared",
                    relation.target_entity
                ),
                relation.span.clone(),
            );
        }
        if let Some(entity) = scope.entities.get(&relation.source_entity) {
            if entity.fields.iter().any(|f| f.name == relation.source_field) {
                diagnostics.error(
                    DiagnosticCode::ErrDuplicateName,
                    format!(
                        "relation field '{}' collides with a declared field on '{}'",
                        relation.source_field, relation.source_entity
                    ),
                    relation.span.clone(),
                );
            }
        }
    }
}

/// Root names an expression may reference without further checking beyond
/// "is this root known".
enum AllowedRoot {
    Field,
    Relation,
    User,
    Param,
}

fn classify_root(
    entity: &EntityDecl,
    relations: &BTreeMap<&str, &RelationDecl>,
    root: &str,
) -> Option<AllowedRoot> {
    if entity.fields.iter().any(|f| f.name == root) {
        return Some(AllowedRoot::Field);
    }
    if relations.contains_key(root) {
        return Some(AllowedRoot::Relation);
    }
    if root == "user" {
        return Some(AllowedRoot::User);
    }
    if root == "param" {
        return Some(AllowedRoot::Param);
    }
    None
}

/// Walk `expr`, resolving every identifier/path root against `entity`'s
/// fields, its declared relations, and the ambient `user`/`param` roots.
fn validate_expr(
    expr: &Expr,
    entity: &EntityDecl,
    relations: &BTreeMap<&str, &RelationDecl>,
    diagnostics: &mut Diagnostics,
) {
    match &expr.kind {
        ExprKind::Ident(name) => {
            if classify_root(entity, relations, name).is_none() {
                diagnostics.error(
                    DiagnosticCode::ErrUnresolved,
                    format!("unresolved identifier '{name}'"),
                    expr.span.clone(),
                );
            }
        }
        ExprKind::Path(parts) => {
            let root = &parts[0];
            match classify_root(entity, relations, root) {
                Some(AllowedRoot::User) if parts.len() >= 2 => {
                    if parts.len() == 2 && !USER_FIELDS.contains(&parts[1].as_str()) {
                        // Not a fatal error: `user` may carry relation-walked
                        // paths the analyzer can't enumerate without a full
                        // entity graph for the (external) user principal.
                    }
                }
                Some(_) => {}
                None => {
                    diagnostics.error(
                        DiagnosticCode::ErrUnresolved,
                        format!("unresolved path root '{root}'"),
                        expr.span.clone(),
                    );
                }
            }
        }
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) => {}
        ExprKind::Unary { operand, .. } => validate_expr(operand, entity, relations, diagnostics),
        ExprKind::Binary { left, right, .. } | ExprKind::In { left, right } => {
            validate_expr(left, entity, relations, diagnostics);
            validate_expr(right, entity, relations, diagnostics);
        }
        ExprKind::Call { args, .. } => {
            // The callee names a function in a separate namespace (e.g.
            // `now`), not a field reference; only its arguments are checked.
            for arg in args {
                validate_expr(arg, entity, relations, diagnostics);
            }
        }
        ExprKind::Grouped(inner) => validate_expr(inner, entity, relations, diagnostics),
    }
}

fn validate_rules_and_access(scope: &Scope, diagnostics: &mut Diagnostics) {
    for rule in scope.rules.values() {
        let Some(entity) = scope.entities.get(&rule.target_entity) else {
            diagnostics.error(
                DiagnosticCode::ErrUnresolved,
                format!("rule target entity '{}' is not declared", rule.target_entity),
                rule.span.clone(),
            );
            continue;
        };
        let relations = scope.relations_of(&rule.target_entity);
        for clause in &rule.clauses {
            validate_expr(&clause.condition, entity, &relations, diagnostics);
            if let Some(emit) = &clause.emit {
                if !scope.messages.contains_key(emit) {
                    diagnostics.error(
                        DiagnosticCode::ErrUnknownMessage,
                        format!("rule emits undeclared message '{emit}'"),
                        clause.span.clone(),
                    );
                }
            }
        }
    }

    for access in scope.access.values() {
        let Some(entity) = scope.entities.get(&access.entity) else {
            diagnostics.error(
                DiagnosticCode::ErrUnresolved,
                format!("access target entity '{}' is not declared", access.entity),
                access.span.clone(),
            );
            continue;
        };
        let relations = scope.relations_of(&access.entity);
        if let Some(read) = &access.read {
            validate_expr(read, entity, &relations, diagnostics);
        }
        if let Some(write) = &access.write {
            validate_expr(write, entity, &relations, diagnostics);
        }
    }
}

fn validate_defaults(scope: &Scope, diagnostics: &mut Diagnostics) {
    for entity in scope.entities.values() {
        for field in &entity.fields {
            let Some(default) = &field.default else {
                continue;
            };
            match &field.type_expr {
                TypeExpr::Enum { members, span } => match &default.kind {
                    ExprKind::Ident(name) if members.contains(name) => {}
                    _ => diagnostics.error(
                        DiagnosticCode::ErrInvalidDefault,
                        format!(
                            "default for enum field '{}' must be one of its declared members",
                            field.name
                        ),
                        span.clone(),
                    ),
                },
                TypeExpr::Named { name, span } => {
                    let type_ok = match name.as_str() {
                        "int" => matches!(default.kind, ExprKind::Int(_)),
                        "float" => matches!(default.kind, ExprKind::Int(_) | ExprKind::Float(_)),
                        "bool" => matches!(default.kind, ExprKind::Bool(_)),
                        "string" | "file" => matches!(default.kind, ExprKind::Str(_)),
                        "time" | "uuid" => matches!(
                            default.kind,
                            ExprKind::Call { .. } | ExprKind::Str(_)
                        ),
                        _ if BUILTIN_TYPES.contains(&name.as_str()) => true,
                        _ => true,
                    };
                    if !type_ok {
                        diagnostics.error(
                            DiagnosticCode::ErrTypeMismatch,
                            format!("default value for field '{}' does not match type '{name}'", field.name),
                            span.clone(),
                        );
                    }
                }
            }
        }
    }
}

fn validate_hooks(scope: &Scope, diagnostics: &mut Diagnostics) {
    for hook in &scope.hooks {
        if !scope.entities.contains_key(&hook.target_entity) {
            diagnostics.error(
                DiagnosticCode::ErrInvalidHookTarget,
                format!("hook target entity '{}' is not declared", hook.target_entity),
                hook.span.clone(),
            );
            continue;
        }
        let timing_ok = matches!(hook.timing.as_str(), "before" | "after");
        let operation_ok = matches!(hook.operation.as_str(), "create" | "update" | "delete");
        if !timing_ok || !operation_ok {
            diagnostics.error(
                DiagnosticCode::ErrInvalidHookTarget,
                format!(
                    "hook target must be 'Entity.(before|after)_(create|update|delete)', found '{}.{}_{}'",
                    hook.target_entity, hook.timing, hook.operation
                ),
                hook.span.clone(),
            );
        }
        for job_name in &hook.enqueue {
            if !scope.jobs.contains_key(job_name) {
                diagnostics.error(
                    DiagnosticCode::ErrUnknownJob,
                    format!("hook enqueues undeclared job '{job_name}'"),
                    hook.span.clone(),
                );
            }
        }
    }
}

fn validate_jobs(scope: &Scope, diagnostics: &mut Diagnostics) {
    for job in scope.jobs.values() {
        if !scope.entities.contains_key(&job.input_entity) {
            diagnostics.error(
                DiagnosticCode::ErrUnresolved,
                format!("job input entity '{}' is not declared", job.input_entity),
                job.span.clone(),
            );
        }
        if let Some(needs) = &job.needs {
            let mut current_entity = job.input_entity.clone();
            for part in &needs.path.parts {
                let relations = scope.relations_of(&current_entity);
                match relations.get(part.as_str()) {
                    Some(relation) => current_entity = relation.target_entity.clone(),
                    None => {
                        diagnostics.error(
                            DiagnosticCode::ErrUnknownRelation,
                            format!(
                                "needs path '{}' does not traverse a declared relation from '{}'",
                                needs.path.as_str(),
                                job.input_entity
                            ),
                            needs.span.clone(),
                        );
                        break;
                    }
                }
            }
            if let Some(where_expr) = &needs.where_expr {
                if let Some(entity) = scope.entities.get(&current_entity) {
                    let relations = scope.relations_of(&current_entity);
                    validate_expr(where_expr, entity, &relations, diagnostics);
                }
            }
        }
        // Effect capabilities are provider-driven and open-ended; unknown
        // effects are not validated here beyond requiring a non-empty path,
        // which the parser already guarantees.
    }
}

fn validate_tests(scope: &Scope, diagnostics: &mut Diagnostics) {
    for test in &scope.tests {
        let root = &test.target.parts[0];
        let entity = scope.entities.get(root);
        if let Some(entity) = entity {
            for (path, value) in &test.given {
                let field_name = &path.parts[path.parts.len() - 1];
                if !entity.fields.iter().any(|f| &f.name == field_name) {
                    diagnostics.error(
                        DiagnosticCode::ErrUnresolved,
                        format!("given path '{}' does not refer to a declared field", path.as_str()),
                        path.span.clone(),
                    );
                }
                let relations = scope.relations_of(root);
                validate_expr(value, entity, &relations, diagnostics);
            }
        } else if !scope.actions.contains_key(root) {
            diagnostics.error(
                DiagnosticCode::ErrUnresolved,
                format!("test target '{}' is neither a declared entity nor action", root),
                test.target.span.clone(),
            );
        }

        let when_root = &test.when.target.parts[0];
        if !scope.entities.contains_key(when_root) && !scope.actions.contains_key(when_root) {
            diagnostics.error(
                DiagnosticCode::ErrUnresolved,
                format!(
                    "when target '{}' is neither a declared entity nor action",
                    test.when.target.as_str()
                ),
                test.when.span.clone(),
            );
        }

        if let ExpectClause::Reject { message, span } = &test.expect {
            if !scope.messages.contains_key(message) {
                diagnostics.error(
                    DiagnosticCode::ErrUnknownMessage,
                    format!("expect reject references undeclared message '{message}'"),
                    span.clone(),
                );
            }
        }
    }
}

/// Analyze `file`, returning a read-only [`Scope`] plus any diagnostics
/// raised while building and validating it.
pub fn analyze(file: &File) -> (Scope, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut collector = Collector {
        scope: Scope::default(),
        diagnostics: &mut diagnostics,
    };
    collector.collect(file);
    let scope = collector.scope;

    validate_relations(&scope, &mut diagnostics);
    validate_rules_and_access(&scope, &mut diagnostics);
    validate_defaults(&scope, &mut diagnostics);
    validate_hooks(&scope, &mut diagnostics);
    validate_jobs(&scope, &mut diagnostics);
    validate_tests(&scope, &mut diagnostics);

    (scope, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn duplicate_entity_names_are_diagnosed() {
        let (file, _) = parse("entity A { x: int } entity A { y: int }", "t.forge");
        let (_, diags) = analyze(&file);
        assert!(diags.has_errors());
    }

    #[test]
    fn unresolved_rule_identifier_is_diagnosed() {
        let (file, _) = parse(
            "entity Ticket { status: string } rule Ticket.update { forbid if bogus == 1 }",
            "t.forge",
        );
        let (_, diags) = analyze(&file);
        assert!(diags.has_errors());
    }

    #[test]
    fn clean_spec_has_no_errors() {
        let src = r#"
            entity User { email: string unique }
            entity Ticket { subject: string status: enum(open, closed) = open }
            relation Ticket.author -> User
            access Ticket { read: user in author write: user.id == author }
        "#;
        let (file, _) = parse(src, "t.forge");
        let (_, diags) = analyze(&file);
        assert!(!diags.has_errors(), "unexpected diagnostics: {:?}", diags.iter().collect::<Vec<_>>());
    }
}
