//! Serialize a [`forge_core::Plan`] into its three output artifacts.
//!
//! Per §4.6: a JSON runtime artifact (the Plan verbatim, consumed by the
//! server), a SQL schema text (consumed by the database), and a typed SDK
//! text stub (a templated projection of the plan's entities and views).

use forge_core::{OnDelete, Plan, PolicyCommand};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::position::Span;

/// The fixed trigger helper function name every `updated_at` trigger calls.
const UPDATED_AT_FN: &str = "forge_set_updated_at";

#[derive(Debug, Clone)]
pub struct EmitOutput {
    pub artifact_json: String,
    pub schema_sql: String,
    pub sdk_text: String,
}

/// Serialize `plan` into its three artifacts, returning diagnostics
/// alongside them (empty unless JSON serialization itself fails, which only
/// happens if the Plan contains a NaN/infinite float).
pub fn emit(plan: &Plan) -> (EmitOutput, Diagnostics) {
    let mut diagnostics = Diagnostics::new();

    let artifact_json = match serde_json::to_string_pretty(plan) {
        Ok(json) => json,
        Err(err) => {
            diagnostics.error(
                DiagnosticCode::ErrInvalidDefault,
                format!("failed to serialize runtime artifact: {err}"),
                Span::synthetic(),
            );
            String::new()
        }
    };

    let schema_sql = emit_schema_sql(plan);
    let sdk_text = emit_sdk_text(plan);

    (
        EmitOutput {
            artifact_json,
            schema_sql,
            sdk_text,
        },
        diagnostics,
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn column_sql(column: &forge_core::ColumnSpec) -> String {
    let mut parts = vec![quote_ident(&column.name), column.sql_type.clone()];
    if column.is_primary_key {
        parts.push("PRIMARY KEY".to_string());
    } else if !column.nullable {
        parts.push("NOT NULL".to_string());
    }
    if column.unique && !column.is_primary_key {
        parts.push("UNIQUE".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default.to_sql_default()));
    }
    if let Some(fk) = &column.references {
        let action = match fk.on_delete {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
        };
        parts.push(format!(
            "REFERENCES {}({}) ON DELETE {action}",
            quote_ident(&fk.table),
            quote_ident(&fk.column)
        ));
    }
    parts.join(" ")
}

/// Build the schema SQL text: the ordered concatenation described in §4.6 —
/// CREATE TYPE, CREATE TABLE, CREATE INDEX, ENABLE RLS, CREATE POLICY,
/// CREATE TRIGGER, plus the fixed `updated_at` trigger function every
/// trigger depends on.
fn emit_schema_sql(plan: &Plan) -> String {
    let migration = &plan.migration;
    let mut out = String::new();
    out.push_str(&format!("-- migration version: {}\n\n", migration.version));

    for enum_type in &migration.enum_types {
        let values = enum_type
            .values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "CREATE TYPE {} AS ENUM ({values});\n",
            quote_ident(&enum_type.name)
        ));
    }
    if !migration.enum_types.is_empty() {
        out.push('\n');
    }

    for table in &migration.tables {
        out.push_str(&format!("CREATE TABLE {} (\n", quote_ident(&table.name)));
        let columns: Vec<String> = table.columns.iter().map(|c| format!("    {}", column_sql(c))).collect();
        out.push_str(&columns.join(",\n"));
        out.push_str("\n);\n\n");
    }

    for index in &migration.indexes {
        let kind = if index.unique { "CREATE UNIQUE INDEX" } else { "CREATE INDEX" };
        out.push_str(&format!(
            "{kind} {} ON {} ({});\n",
            quote_ident(&index.name),
            quote_ident(&index.table),
            quote_ident(&index.column)
        ));
    }
    if !migration.indexes.is_empty() {
        out.push('\n');
    }

    for table in &migration.tables {
        out.push_str(&format!(
            "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;\n",
            quote_ident(&table.name)
        ));
    }
    if !migration.tables.is_empty() {
        out.push('\n');
    }

    for policy in &migration.policies {
        let command = match policy.command {
            PolicyCommand::Select => "SELECT",
            PolicyCommand::All => "ALL",
        };
        out.push_str(&format!(
            "CREATE POLICY {} ON {} FOR {command} USING ({})",
            quote_ident(&policy.name),
            quote_ident(&policy.table),
            policy.using_sql
        ));
        if let Some(check) = &policy.check_sql {
            out.push_str(&format!(" WITH CHECK ({check})"));
        }
        out.push_str(";\n");
    }
    if !migration.policies.is_empty() {
        out.push('\n');
    }

    if !migration.triggers.is_empty() {
        out.push_str(&format!(
            "CREATE OR REPLACE FUNCTION {UPDATED_AT_FN}() RETURNS trigger AS $$\nBEGIN\n    NEW.updated_at = now();\n    RETURN NEW;\nEND;\n$$ LANGUAGE plpgsql;\n\n"
        ));
        for trigger in &migration.triggers {
            out.push_str(&format!(
                "CREATE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE FUNCTION {UPDATED_AT_FN}();\n",
                quote_ident(&trigger.name),
                quote_ident(&trigger.table)
            ));
        }
    }

    out
}

/// A templated projection of the plan's entities and views into TypeScript
/// interfaces. This is deliberately minimal: the exact SDK text format is an
/// external collaborator's concern, not part of the compiled core.
fn emit_sdk_text(plan: &Plan) -> String {
    let mut out = String::new();
    out.push_str("// generated by forge-lang; do not edit by hand\n\n");

    for table in &plan.migration.tables {
        out.push_str(&format!("export interface {} {{\n", pascal_case(&table.name)));
        for column in &table.columns {
            out.push_str(&format!(
                "  {}: {};\n",
                column.name,
                ts_type_for(&column.sql_type)
            ));
        }
        out.push_str("}\n\n");
    }

    for view in plan.views.values() {
        out.push_str(&format!("export interface {} {{\n", pascal_case(&view.name)));
        for field in &view.fields {
            out.push_str(&format!("  {}: {};\n", field.name, ts_type_for(&field.sql_type)));
        }
        out.push_str("}\n\n");
    }

    out
}

fn ts_type_for(sql_type: &str) -> &'static str {
    match sql_type {
        "integer" | "double precision" => "number",
        "boolean" => "boolean",
        "uuid" | "text" | "timestamptz" => "string",
        _ => "string",
    }
}

fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::normalize::normalize;
    use crate::parser::parse;

    fn compile(src: &str) -> Plan {
        let (file, mut diags) = parse(src, "t.forge");
        let (scope, analyze_diags) = analyze(&file);
        diags.merge(analyze_diags);
        let normalized = normalize(&file, &scope, &mut diags);
        crate::plan::plan(&scope, &normalized, "v1", &mut diags)
    }

    #[test]
    fn schema_sql_orders_statements_per_contract() {
        let plan = compile(
            r#"
            entity User { email: string unique }
            entity Ticket { subject: string status: enum(open, closed) = open }
            relation Ticket.author -> User
            access Ticket { read: user in author }
            "#,
        );
        let (output, diagnostics) = emit(&plan);
        assert!(!diagnostics.has_errors());

        let type_pos = output.schema_sql.find("CREATE TYPE").unwrap();
        let table_pos = output.schema_sql.find("CREATE TABLE").unwrap();
        let index_pos = output.schema_sql.find("CREATE INDEX").or_else(|| output.schema_sql.find("CREATE UNIQUE INDEX")).unwrap();
        let rls_pos = output.schema_sql.find("ENABLE ROW LEVEL SECURITY").unwrap();
        let policy_pos = output.schema_sql.find("CREATE POLICY").unwrap();
        let trigger_pos = output.schema_sql.find("CREATE TRIGGER").unwrap();

        assert!(type_pos < table_pos);
        assert!(table_pos < index_pos);
        assert!(index_pos < rls_pos);
        assert!(rls_pos < policy_pos);
        assert!(policy_pos < trigger_pos);
    }

    #[test]
    fn artifact_json_round_trips_through_serde() {
        let plan = compile("entity Ticket { subject: string }");
        let (output, _diags) = emit(&plan);
        let parsed: Plan = serde_json::from_str(&output.artifact_json).unwrap();
        assert_eq!(parsed, plan);
    }
}
