//! Build the execution [`forge_core::Plan`] from normalized inputs.
//!
//! Three subroutines, matching §4.5: action graph construction, view
//! planning (joins, filters, sort, pagination anchor), and migration plan
//! construction (tables, enums, indexes, policies, triggers). Every
//! collection here is sorted before being handed to `forge_core` types so
//! the plan is byte-deterministic for a given input.

use std::collections::{BTreeMap, BTreeSet};

use forge_core::{
    AccessNode, ActionNode, ColumnSpec, EnumTypeSpec, ForeignKeySpec, HookNode, HookTiming,
    IndexSpec, JoinKind, JoinSpec, MigrationPlan, OnDelete, Operation, Plan, PolicyCommand,
    PolicySpec, ResolvedField, RuleKind, RuleNode, SortSpec, TableSpec, TriggerSpec, ViewNode,
};

use crate::analyze::Scope;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::normalize::{cel_to_sql, NormalizedFile};
use crate::parser::ast::*;

// ---------------------------------------------------------------------
// Naming conventions (§3 invariant 3)
// ---------------------------------------------------------------------

fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn pluralize(word: &str) -> String {
    let ends_with_sibilant =
        word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh");
    if ends_with_sibilant {
        format!("{word}es")
    } else if word.ends_with('y')
        && !word[..word.len() - 1]
            .chars()
            .next_back()
            .map(|c| "aeiou".contains(c))
            .unwrap_or(false)
    {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{word}s")
    }
}

fn table_name(entity: &str) -> String {
    pluralize(&to_snake_case(entity))
}

fn enum_type_name(table: &str, field: &str) -> String {
    format!("{table}_{field}")
}

fn index_name(table: &str, column: &str) -> String {
    format!("idx_{table}_{column}")
}

fn read_policy_name(table: &str) -> String {
    format!("{table}_read_policy")
}

fn write_policy_name(table: &str) -> String {
    format!("{table}_write_policy")
}

fn trigger_name(table: &str) -> String {
    format!("{table}_updated_at")
}

fn relation_fk_column(field: &str) -> String {
    format!("{field}_id")
}

// ---------------------------------------------------------------------
// Action graph construction
// ---------------------------------------------------------------------

fn expr_as_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(name.clone()),
        ExprKind::Path(parts) => Some(parts.join(".")),
        ExprKind::Str(s) => Some(s.clone()),
        _ => None,
    }
}

struct ActionShape {
    operation: Operation,
    target_entity: String,
    input_entity: String,
}

/// Infer an action's operation/target/input from its well-known property
/// keys. `creates`/`updates`/`deletes` each imply both the operation and
/// the target entity; otherwise an explicit `operation`/`target` pair is
/// used. `input` defaults to the target entity when absent.
fn shape_of_action(action: &ActionDecl, diagnostics: &mut Diagnostics) -> Option<ActionShape> {
    let mut operation = None;
    let mut target_entity = None;
    let mut input_entity = None;

    for (key, value) in &action.properties {
        match key.as_str() {
            "creates" => {
                operation = Some(Operation::Create);
                target_entity = expr_as_name(value);
            }
            "updates" => {
                operation = Some(Operation::Update);
                target_entity = expr_as_name(value);
            }
            "deletes" => {
                operation = Some(Operation::Delete);
                target_entity = expr_as_name(value);
            }
            "operation" => {
                operation = match expr_as_name(value).as_deref() {
                    Some("create") => Some(Operation::Create),
                    Some("update") => Some(Operation::Update),
                    Some("delete") => Some(Operation::Delete),
                    _ => operation,
                };
            }
            "target" => target_entity = expr_as_name(value),
            "input" => input_entity = expr_as_name(value),
            _ => {}
        }
    }

    let (Some(operation), Some(target_entity)) = (operation, target_entity) else {
        diagnostics.error(
            DiagnosticCode::ErrUnresolved,
            format!(
                "action '{}' does not declare a recognized operation/target (expected one of 'creates:', 'updates:', 'deletes:', or 'operation:' + 'target:')",
                action.name
            ),
            action.span.clone(),
        );
        return None;
    };
    let input_entity = input_entity.unwrap_or_else(|| target_entity.clone());

    Some(ActionShape {
        operation,
        target_entity,
        input_entity,
    })
}

fn operation_str(op: Operation) -> &'static str {
    match op {
        Operation::Create => "create",
        Operation::Update => "update",
        Operation::Delete => "delete",
    }
}

fn build_rule_nodes(normalized: &NormalizedFile, target_entity: &str, operation: Operation) -> Vec<RuleNode> {
    normalized
        .rules
        .iter()
        .filter(|r| r.target_entity == target_entity && r.target_operation == operation_str(operation))
        .flat_map(|r| {
            r.clauses.iter().map(|clause| {
                let sql = cel_to_sql(&clause.condition.cel);
                let predicate_sql = match clause.kind {
                    RuleClauseKind::Require => sql,
                    RuleClauseKind::Forbid => format!("NOT ({sql})"),
                };
                RuleNode {
                    kind: match clause.kind {
                        RuleClauseKind::Forbid => RuleKind::Forbid,
                        RuleClauseKind::Require => RuleKind::Require,
                    },
                    condition_cel: clause.condition.cel.clone(),
                    predicate_sql,
                    emit_code: clause.emit.clone(),
                }
            })
        })
        .collect()
}

fn access_node_from(a: &crate::normalize::NormalizedAccess) -> AccessNode {
    AccessNode {
        entity: a.entity.clone(),
        read_cel: a.read.as_ref().map(|c| c.cel.clone()),
        read_sql: a.read.as_ref().map(|c| cel_to_sql(&c.cel)),
        write_cel: a.write.as_ref().map(|c| c.cel.clone()),
        write_sql: a.write.as_ref().map(|c| cel_to_sql(&c.cel)),
    }
}

fn build_actions(
    scope: &Scope,
    normalized: &NormalizedFile,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, ActionNode> {
    let mut actions = BTreeMap::new();
    for action in scope.actions.values() {
        let Some(shape) = shape_of_action(action, diagnostics) else {
            continue;
        };

        let rules = build_rule_nodes(normalized, &shape.target_entity, shape.operation);
        let access = normalized
            .access
            .iter()
            .find(|a| a.entity == shape.target_entity)
            .map(access_node_from);

        let mut pre_hooks = Vec::new();
        let mut post_hooks = Vec::new();
        for hook in &scope.hooks {
            if hook.target_entity != shape.target_entity || hook.operation != operation_str(shape.operation) {
                continue;
            }
            match hook.timing.as_str() {
                "before" => pre_hooks.extend(hook.enqueue.iter().cloned()),
                "after" => post_hooks.extend(hook.enqueue.iter().cloned()),
                _ => {}
            }
        }

        actions.insert(
            action.name.clone(),
            ActionNode {
                name: action.name.clone(),
                input_entity: shape.input_entity,
                operation: shape.operation,
                target_entity: shape.target_entity,
                rules,
                access,
                pre_hooks,
                post_hooks,
            },
        );
    }
    actions
}

fn build_hooks(scope: &Scope) -> Vec<HookNode> {
    let mut hooks = Vec::new();
    for hook in &scope.hooks {
        let timing = match hook.timing.as_str() {
            "before" => HookTiming::Before,
            "after" => HookTiming::After,
            _ => continue,
        };
        let operation = match hook.operation.as_str() {
            "create" => Operation::Create,
            "update" => Operation::Update,
            "delete" => Operation::Delete,
            _ => continue,
        };
        hooks.push(HookNode {
            entity: hook.target_entity.clone(),
            timing,
            operation,
            jobs: hook.enqueue.clone(),
        });
    }
    hooks.sort();
    hooks
}

// ---------------------------------------------------------------------
// View planning
// ---------------------------------------------------------------------

fn field_sql_type(entities: &BTreeMap<String, &NormalizedEntityRef>, entity: &str, field: &str) -> String {
    entities
        .get(entity)
        .and_then(|e| e.fields.iter().find(|f| f.name == field))
        .map(|f| {
            if f.enum_values.is_some() {
                enum_type_name(&table_name(entity), field)
            } else {
                f.sql_type.clone()
            }
        })
        .unwrap_or_else(|| "text".to_string())
}

/// A thin alias so `field_sql_type` doesn't need to borrow the whole
/// `NormalizedFile`.
type NormalizedEntityRef = crate::normalize::NormalizedEntity;

fn render_view_predicate(
    expr: &Expr,
    entity: &str,
    relations: &BTreeMap<&str, &RelationDecl>,
    params: &mut Vec<String>,
) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => {
            if relations.contains_key(name.as_str()) {
                name.clone()
            } else if name == "user" {
                name.clone()
            } else {
                format!("t.{name}")
            }
        }
        ExprKind::Path(parts) => {
            if parts[0] == "param" && parts.len() == 2 {
                if !params.contains(&parts[1]) {
                    params.push(parts[1].clone());
                }
                let idx = params.iter().position(|p| p == &parts[1]).unwrap() + 1;
                format!("${idx}")
            } else if parts[0] == "user" {
                parts.join(".")
            } else if let Some(_rel) = relations.get(parts[0].as_str()) {
                format!("j_{}.{}", parts[0], parts[1..].join("."))
            } else {
                format!("t.{}", parts.join("."))
            }
        }
        ExprKind::Int(n) => n.to_string(),
        ExprKind::Float(f) => f.to_string(),
        ExprKind::Str(s) => format!("'{}'", s.replace('\'', "''")),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Unary { op, operand } => {
            let inner = render_view_predicate(operand, entity, relations, params);
            match op {
                UnOp::Neg => format!("-{inner}"),
                UnOp::Not => format!("NOT {inner}"),
            }
        }
        ExprKind::Binary { left, op, right } => {
            let l = render_view_predicate(left, entity, relations, params);
            let r = render_view_predicate(right, entity, relations, params);
            let sym = match op {
                BinOp::Or => "OR",
                BinOp::And => "AND",
                BinOp::Eq => "=",
                BinOp::Ne => "<>",
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
            let l = render_view_predicate(left, entity, relations, params);
            let r = render_view_predicate(right, entity, relations, params);
            format!("{l} IN ({r})")
        }
        ExprKind::Call { callee, args } => {
            let callee_str = render_view_predicate(callee, entity, relations, params);
            let args_str: Vec<String> = args
                .iter()
                .map(|a| render_view_predicate(a, entity, relations, params))
                .collect();
            format!("{callee_str}({})", args_str.join(", "))
        }
        ExprKind::Grouped(inner) => format!("({})", render_view_predicate(inner, entity, relations, params)),
    }
}

fn build_views(
    scope: &Scope,
    normalized_entities: &BTreeMap<String, NormalizedEntityRef>,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, ViewNode> {
    let entity_refs: BTreeMap<String, &NormalizedEntityRef> =
        normalized_entities.iter().map(|(k, v)| (k.clone(), v)).collect();

    let mut views = BTreeMap::new();
    for view in scope.views.values() {
        let source_table = table_name(&view.source);
        let relations = scope.relations_of(&view.source);

        let mut fields = vec![ResolvedField {
            name: "id".to_string(),
            sql: "t.id".to_string(),
            alias: "id".to_string(),
            sql_type: "uuid".to_string(),
            filterable: false,
            sortable: true,
        }];

        let mut joins: BTreeSet<JoinSpec> = BTreeSet::new();
        let mut dependencies: BTreeSet<String> = BTreeSet::new();
        dependencies.insert(view.source.clone());

        for path in &view.fields {
            let name = path.as_str();
            match path.parts.len() {
                1 => {
                    let field_name = &path.parts[0];
                    fields.push(ResolvedField {
                        name: name.clone(),
                        sql: format!("t.{field_name}"),
                        alias: name.clone(),
                        sql_type: field_sql_type(&entity_refs, &view.source, field_name),
                        filterable: true,
                        sortable: true,
                    });
                }
                2 => {
                    let rel_name = &path.parts[0];
                    let target_field = &path.parts[1];
                    if let Some(relation) = relations.get(rel_name.as_str()) {
                        let alias = format!("j_{rel_name}");
                        let target_table = table_name(&relation.target_entity);
                        joins.insert(JoinSpec {
                            alias: alias.clone(),
                            table: target_table,
                            on: format!("{alias}.id = t.{}", relation_fk_column(rel_name)),
                            kind: JoinKind::Left,
                        });
                        dependencies.insert(relation.target_entity.clone());
                        fields.push(ResolvedField {
                            name: name.clone(),
                            sql: format!("{alias}.{target_field}"),
                            alias: name.clone(),
                            sql_type: field_sql_type(&entity_refs, &relation.target_entity, target_field),
                            filterable: true,
                            sortable: true,
                        });
                    } else {
                        fields.push(ResolvedField {
                            name: name.clone(),
                            sql: format!("t.{name}"),
                            alias: name.clone(),
                            sql_type: "text".to_string(),
                            filterable: false,
                            sortable: false,
                        });
                    }
                }
                _ => {
                    diagnostics.error(
                        DiagnosticCode::ErrDeepViewPath,
                        format!(
                            "view field path '{name}' has {} components; paths of 3 or more are not resolved through joins and are emitted as a bare text column",
                            path.parts.len()
                        ),
                        path.span.clone(),
                    );
                    fields.push(ResolvedField {
                        name: name.clone(),
                        sql: format!("t.{name}"),
                        alias: name.clone(),
                        sql_type: "text".to_string(),
                        filterable: false,
                        sortable: false,
                    });
                }
            }
        }

        let mut params = Vec::new();
        let filter_sql = view.filter.as_ref().map(|expr| {
            let entity_relations = scope.relations_of(&view.source);
            render_view_predicate(expr, &view.source, &entity_relations, &mut params)
        });

        let default_sort = if view.sort.is_empty() {
            vec![
                SortSpec {
                    column: "t.created_at".to_string(),
                    descending: true,
                },
                SortSpec {
                    column: "t.id".to_string(),
                    descending: true,
                },
            ]
        } else {
            let mut sort: Vec<SortSpec> = view
                .sort
                .iter()
                .map(|term| {
                    let column = match term.path.parts.len() {
                        1 => format!("t.{}", term.path.parts[0]),
                        _ => term.path.as_str(),
                    };
                    SortSpec {
                        column,
                        descending: term.descending,
                    }
                })
                .collect();
            if !sort.iter().any(|s| s.column == "t.id") {
                sort.push(SortSpec {
                    column: "t.id".to_string(),
                    descending: true,
                });
            }
            sort
        };

        let mut dependencies: Vec<String> = dependencies.into_iter().collect();
        dependencies.sort();

        views.insert(
            view.name.clone(),
            ViewNode {
                name: view.name.clone(),
                source_table,
                fields,
                joins: joins.into_iter().collect(),
                filter_sql,
                filter_params: params,
                default_sort,
                dependencies,
            },
        );
    }
    views
}

// ---------------------------------------------------------------------
// Migration plan construction
// ---------------------------------------------------------------------

fn build_migration(
    scope: &Scope,
    normalized: &NormalizedFile,
    version: String,
    diagnostics: &mut Diagnostics,
) -> MigrationPlan {
    let mut enum_types = Vec::new();
    let mut tables_by_entity: BTreeMap<String, TableSpec> = BTreeMap::new();

    for entity in normalized.entities.iter() {
        let table = table_name(&entity.name);
        let mut columns = vec![ColumnSpec {
            name: "id".to_string(),
            sql_type: "uuid".to_string(),
            nullable: false,
            unique: true,
            default: Some(forge_core::Value::Func("gen_random_uuid()".to_string())),
            is_primary_key: true,
            references: None,
        }];

        for field in &entity.fields {
            let sql_type = if let Some(values) = &field.enum_values {
                let enum_name = enum_type_name(&table, &field.name);
                enum_types.push(EnumTypeSpec {
                    name: enum_name.clone(),
                    table: table.clone(),
                    field: field.name.clone(),
                    values: values.clone(),
                });
                enum_name
            } else {
                field.sql_type.clone()
            };
            columns.push(ColumnSpec {
                name: field.name.clone(),
                sql_type,
                nullable: field.nullable,
                unique: field.unique,
                default: field.default.clone(),
                is_primary_key: false,
                references: None,
            });
        }

        for (_, relation) in scope.relations_of(&entity.name) {
            columns.push(ColumnSpec {
                name: relation_fk_column(&relation.source_field),
                sql_type: "uuid".to_string(),
                nullable: true,
                unique: !relation.many,
                default: None,
                is_primary_key: false,
                references: Some(ForeignKeySpec {
                    table: table_name(&relation.target_entity),
                    column: "id".to_string(),
                    on_delete: OnDelete::default(),
                }),
            });
        }

        columns.push(ColumnSpec {
            name: "created_at".to_string(),
            sql_type: "timestamptz".to_string(),
            nullable: false,
            unique: false,
            default: Some(forge_core::Value::Func("now()".to_string())),
            is_primary_key: false,
            references: None,
        });
        columns.push(ColumnSpec {
            name: "updated_at".to_string(),
            sql_type: "timestamptz".to_string(),
            nullable: false,
            unique: false,
            default: Some(forge_core::Value::Func("now()".to_string())),
            is_primary_key: false,
            references: None,
        });

        tables_by_entity.insert(entity.name.clone(), TableSpec { name: table, columns });
    }

    let (ordered_tables, circular) = topological_sort_tables(scope, &tables_by_entity, diagnostics);

    let mut indexes = Vec::new();
    for entity in &normalized.entities {
        let table = table_name(&entity.name);
        for field in &entity.fields {
            if field.unique {
                indexes.push(IndexSpec {
                    name: index_name(&table, &field.name),
                    table: table.clone(),
                    column: field.name.clone(),
                    unique: true,
                });
            }
        }
        for (_, relation) in scope.relations_of(&entity.name) {
            let column = relation_fk_column(&relation.source_field);
            indexes.push(IndexSpec {
                name: index_name(&table, &column),
                table: table.clone(),
                column,
                unique: false,
            });
        }
    }
    indexes.sort();

    let mut policies = Vec::new();
    for access in &normalized.access {
        let table = table_name(&access.entity);
        if let Some(read) = &access.read {
            policies.push(PolicySpec {
                name: read_policy_name(&table),
                table: table.clone(),
                command: PolicyCommand::Select,
                using_sql: cel_to_sql(&read.cel),
                check_sql: None,
            });
        }
        if let Some(write) = &access.write {
            let sql = cel_to_sql(&write.cel);
            policies.push(PolicySpec {
                name: write_policy_name(&table),
                table: table.clone(),
                command: PolicyCommand::All,
                using_sql: sql.clone(),
                check_sql: Some(sql),
            });
        }
    }
    policies.sort_by(|a, b| a.name.cmp(&b.name));

    let mut triggers: Vec<TriggerSpec> = normalized
        .entities
        .iter()
        .map(|e| {
            let table = table_name(&e.name);
            TriggerSpec {
                name: trigger_name(&table),
                table,
            }
        })
        .collect();
    triggers.sort();

    MigrationPlan {
        version,
        enum_types: {
            enum_types.sort();
            enum_types
        },
        tables: ordered_tables,
        indexes,
        policies,
        triggers,
        circular_dependencies: circular,
    }
}

/// Kahn's algorithm over the "source references target" foreign-key
/// dependency graph (the FK lives on the relation's source side — see the
/// "relation `many` flag" design note). Any entities left over after the
/// queue drains participate in a cycle; they're appended in their original
/// insertion order and reported as a warning, matching the "fresh-install
/// schema still applies" rationale in the design notes.
fn topological_sort_tables(
    scope: &Scope,
    tables_by_entity: &BTreeMap<String, TableSpec>,
    diagnostics: &mut Diagnostics,
) -> (Vec<TableSpec>, Vec<String>) {
    let mut in_degree: BTreeMap<String, usize> = tables_by_entity.keys().cloned().map(|k| (k, 0)).collect();
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for relation in scope.relations.values() {
        if !tables_by_entity.contains_key(&relation.source_entity)
            || !tables_by_entity.contains_key(&relation.target_entity)
        {
            continue;
        }
        if relation.source_entity == relation.target_entity {
            continue;
        }
        *in_degree.get_mut(&relation.source_entity).unwrap() += 1;
        dependents
            .entry(relation.target_entity.clone())
            .or_default()
            .push(relation.source_entity.clone());
    }

    let mut ready: BTreeSet<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(name, _)| name.clone())
        .collect();

    let mut ordered_names = Vec::new();
    let mut visited = BTreeSet::new();
    while let Some(name) = ready.pop_first() {
        if !visited.insert(name.clone()) {
            continue;
        }
        ordered_names.push(name.clone());
        if let Some(deps) = dependents.get(&name) {
            for dep in deps {
                let entry = in_degree.get_mut(dep).unwrap();
                *entry -= 1;
                if *entry == 0 {
                    ready.insert(dep.clone());
                }
            }
        }
    }

    let remaining: Vec<String> = tables_by_entity
        .keys()
        .filter(|name| !visited.contains(*name))
        .cloned()
        .collect();

    if !remaining.is_empty() {
        for name in &remaining {
            diagnostics.warning(
                DiagnosticCode::WarnCircularTableDependency,
                format!(
                    "table '{}' participates in a foreign-key cycle; emitted in arbitrary order",
                    tables_by_entity[name].name
                ),
                crate::position::Span::synthetic(),
            );
        }
    }

    let mut tables: Vec<TableSpec> = ordered_names
        .into_iter()
        .filter_map(|name| tables_by_entity.get(&name).cloned())
        .collect();
    tables.extend(remaining.iter().filter_map(|name| tables_by_entity.get(name).cloned()));

    let circular_dependencies = remaining
        .iter()
        .map(|name| tables_by_entity[name].name.clone())
        .collect();

    (tables, circular_dependencies)
}

/// Build the full [`Plan`] from the analyzed scope and normalized file.
/// `version` is the migration version string (the CLI derives this from
/// its own versioning scheme; the core pipeline treats it opaquely).
pub fn plan(
    scope: &Scope,
    normalized: &NormalizedFile,
    version: impl Into<String>,
    diagnostics: &mut Diagnostics,
) -> Plan {
    let normalized_entities: BTreeMap<String, NormalizedEntityRef> = normalized
        .entities
        .iter()
        .map(|e| (e.name.clone(), e.clone()))
        .collect();

    let migration = build_migration(scope, normalized, version.into(), diagnostics);
    let mut result = Plan::new(migration);
    result.actions = build_actions(scope, normalized, diagnostics);
    result.views = build_views(scope, &normalized_entities, diagnostics);
    result.access = normalized
        .access
        .iter()
        .map(|a| (a.entity.clone(), access_node_from(a)))
        .collect();
    result.hooks = build_hooks(scope);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::normalize::normalize;
    use crate::parser::parse;

    fn compile(src: &str) -> (Plan, Diagnostics) {
        let (file, mut diags) = parse(src, "t.forge");
        let (scope, analyze_diags) = analyze(&file);
        diags.merge(analyze_diags);
        let normalized = normalize(&file, &scope, &mut diags);
        let plan = plan(&scope, &normalized, "v1", &mut diags);
        (plan, diags)
    }

    #[test]
    fn relation_creates_foreign_key_and_orders_tables() {
        let src = r#"
            entity User { email: string unique }
            entity Ticket { subject: string }
            relation Ticket.author -> User
        "#;
        let (p, diags) = compile(src);
        assert!(!diags.has_errors());
        assert_eq!(p.migration.tables[0].name, "users");
        assert_eq!(p.migration.tables[1].name, "tickets");
        let ticket_table = &p.migration.tables[1];
        assert!(ticket_table.columns.iter().any(|c| c.name == "author_id"));
        assert!(p.migration.indexes.iter().any(|i| i.table == "users" && i.column == "email" && i.unique));
        assert!(p.migration.indexes.iter().any(|i| i.table == "tickets" && i.column == "author_id" && !i.unique));
    }

    #[test]
    fn access_policy_compiles_to_using_and_check() {
        let src = r#"
            entity Ticket { subject: string }
            access Ticket { read: user in author write: user == author }
            relation Ticket.author -> User
            entity User { name: string }
        "#;
        let (p, _diags) = compile(src);
        let policy = p.migration.policies.iter().find(|pol| pol.name == "tickets_read_policy").unwrap();
        assert_eq!(policy.using_sql, "user in author");
        let write = p.migration.policies.iter().find(|pol| pol.name == "tickets_write_policy").unwrap();
        assert_eq!(write.check_sql.as_deref(), Some(write.using_sql.as_str()));
    }

    #[test]
    fn view_with_joined_field_matches_worked_example() {
        let src = r#"
            entity User { name: string }
            entity Ticket { subject: string }
            relation Ticket.author -> User
            view TicketList { source: Ticket fields: subject, author.name }
        "#;
        let (p, diags) = compile(src);
        assert!(!diags.has_errors());
        let view = &p.views["TicketList"];
        assert_eq!(view.fields[0].name, "id");
        assert_eq!(view.fields[1].sql, "t.subject");
        assert_eq!(view.fields[2].sql, "j_author.name");
        assert_eq!(view.joins.len(), 1);
        assert_eq!(view.joins[0].on, "j_author.id = t.author_id");
        assert_eq!(view.default_sort[0].column, "t.created_at");
    }

    #[test]
    fn rule_predicate_matches_worked_example() {
        let src = r#"
            entity Ticket { status: string }
            rule Ticket.update { forbid if status == closed emit TICKET_CLOSED }
            message TICKET_CLOSED { severity: error text: "closed" }
            action CloseTicket { operation: update target: Ticket input: Ticket }
        "#;
        let (p, diags) = compile(src);
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
        let action = &p.actions["CloseTicket"];
        assert_eq!(action.rules[0].predicate_sql, "NOT (status = closed)");
        assert_eq!(action.rules[0].emit_code.as_deref(), Some("TICKET_CLOSED"));
    }
}
