//! The compiled execution blueprint.
//!
//! `forge-lang::plan` builds these types from a normalized spec; `forge-sql`
//! reads a [`ViewPlan`] (by way of [`ViewNode`]) at request time. Every
//! collection here is a `BTreeMap`/sorted `Vec` on purpose: the planner's
//! determinism guarantee ("two identical inputs produce identical Plan byte
//! outputs") depends on iteration order being part of the type, not an
//! accident of a hasher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Create / update / delete, as inferred by the analyzer from an action's
/// well-known property keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// `forbid` / `require`, as declared on a rule clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Forbid,
    Require,
}

/// A single compiled rule clause, ready to be evaluated as a SQL predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleNode {
    pub kind: RuleKind,
    /// The CEL-compatible condition as declared.
    pub condition_cel: String,
    /// The SQL predicate: the condition verbatim for `require`, or
    /// `NOT (condition)` for `forbid`.
    pub predicate_sql: String,
    pub emit_code: Option<String>,
}

/// The compiled read/write access predicate for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessNode {
    pub entity: String,
    pub read_cel: Option<String>,
    pub read_sql: Option<String>,
    pub write_cel: Option<String>,
    pub write_sql: Option<String>,
}

/// `before` / `after`, as declared on a hook target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookTiming {
    Before,
    After,
}

/// A lifecycle hook binding: `Entity.(before|after)_(create|update|delete)`
/// enqueues the named jobs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HookNode {
    pub entity: String,
    pub timing: HookTiming,
    pub operation: Operation,
    pub jobs: Vec<String>,
}

/// An action's compiled execution node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub name: String,
    pub input_entity: String,
    pub operation: Operation,
    pub target_entity: String,
    pub rules: Vec<RuleNode>,
    pub access: Option<AccessNode>,
    pub pre_hooks: Vec<String>,
    pub post_hooks: Vec<String>,
}

/// LEFT/INNER, as the planner always emits LEFT for relation-walked view
/// fields (see the "Deep paths in views" design note for why no other kind
/// is currently produced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Left,
    Inner,
}

/// One deduplicated join in a view's FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinSpec {
    pub alias: String,
    pub table: String,
    pub on: String,
    pub kind: JoinKind,
}

/// A resolved, query-able field on a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    /// The field's public name (dotted for joined paths, e.g. `author.name`).
    pub name: String,
    /// The SQL column expression, e.g. `t.subject` or `j_author.name`.
    pub sql: String,
    /// The `AS "alias"` portion of the SELECT list entry; equal to `name`.
    pub alias: String,
    pub sql_type: String,
    pub filterable: bool,
    pub sortable: bool,
}

/// One entry of a resolved sort list: a column expression plus direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

/// A compiled, queryable view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    pub name: String,
    pub source_table: String,
    pub fields: Vec<ResolvedField>,
    pub joins: Vec<JoinSpec>,
    /// SQL template with `param.<name>` substituted by positional
    /// placeholders (`$1, $2, ...`), or `None` if the view has no filter.
    pub filter_sql: Option<String>,
    /// Ordered parameter names, first-occurrence order, matching the
    /// placeholders in `filter_sql`.
    pub filter_params: Vec<String>,
    pub default_sort: Vec<SortSpec>,
    /// Every entity reached through a field/sort/filter path, sorted
    /// ascending; the source entity is always included.
    pub dependencies: Vec<String>,
}

/// One CREATE TYPE ... AS ENUM statement's worth of data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumTypeSpec {
    pub name: String,
    pub table: String,
    pub field: String,
    pub values: Vec<String>,
}

/// One column of a generated table, including the implicit `id`,
/// `created_at`, `updated_at`, and relation foreign-key columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<Value>,
    pub is_primary_key: bool,
    pub references: Option<ForeignKeySpec>,
}

/// A foreign-key reference target, used for relation-backed columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub table: String,
    pub column: String,
    pub on_delete: OnDelete,
}

/// The referential action applied on delete of the referenced row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    NoAction,
    Cascade,
    SetNull,
}

impl Default for OnDelete {
    fn default() -> Self {
        // Permissive default per the migration design note: a fresh-install
        // schema should apply even with cyclic references.
        OnDelete::NoAction
    }
}

/// One generated `CREATE TABLE`, already topologically positioned by the
/// planner relative to its foreign-key dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

/// One `CREATE [UNIQUE] INDEX`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub table: String,
    pub column: String,
    pub unique: bool,
}

/// SELECT (`read`) or ALL (`write`), as generated from an access node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyCommand {
    Select,
    All,
}

/// One generated `CREATE POLICY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    pub table: String,
    pub command: PolicyCommand,
    pub using_sql: String,
    /// `WITH CHECK`; set for write (`ALL`) policies, mirroring `using_sql`.
    pub check_sql: Option<String>,
}

/// One `BEFORE UPDATE` trigger maintaining `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub name: String,
    pub table: String,
}

/// The full migration plan: everything needed to emit schema SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub version: String,
    pub enum_types: Vec<EnumTypeSpec>,
    /// Topologically sorted: a referenced table always precedes its
    /// referencer, except within a reported cycle (arbitrary order, flagged
    /// by `circular_dependencies`).
    pub tables: Vec<TableSpec>,
    pub indexes: Vec<IndexSpec>,
    pub policies: Vec<PolicySpec>,
    pub triggers: Vec<TriggerSpec>,
    /// Table names involved in a foreign-key cycle the topological sort
    /// could not order strictly; empty when there is no cycle.
    pub circular_dependencies: Vec<String>,
}

/// The complete compiled execution blueprint for one FORGE spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub actions: BTreeMap<String, ActionNode>,
    pub views: BTreeMap<String, ViewNode>,
    pub access: BTreeMap<String, AccessNode>,
    pub hooks: Vec<HookNode>,
    pub migration: MigrationPlan,
}

impl Plan {
    pub fn new(migration: MigrationPlan) -> Self {
        Self {
            actions: BTreeMap::new(),
            views: BTreeMap::new(),
            access: BTreeMap::new(),
            hooks: Vec::new(),
            migration,
        }
    }
}
