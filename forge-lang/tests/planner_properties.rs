//! Planner invariants: determinism, foreign-key table ordering, view join
//! dedup, and `id` as every view's first resolved field.

use forge_lang::analyze::analyze;
use forge_lang::normalize::normalize;
use forge_lang::parser::parse;
use forge_lang::plan;

fn build(src: &str) -> forge_core::Plan {
    let (file, mut diags) = parse(src, "t.forge");
    let (scope, analyze_diags) = analyze(&file);
    diags.merge(analyze_diags);
    let normalized = normalize(&file, &scope, &mut diags);
    plan(&scope, &normalized, "v1", &mut diags)
}

const SRC: &str = r#"
    entity User { name: string }
    entity Org { name: string }
    entity Ticket { subject: string }
    relation Ticket.author -> User
    relation Ticket.org -> Org
    view TicketList {
        source: Ticket
        fields: subject, author.name, org.name
        sort: -author.name
    }
"#;

#[test]
fn identical_inputs_produce_byte_identical_plan_json() {
    let a = serde_json::to_string_pretty(&build(SRC)).unwrap();
    let b = serde_json::to_string_pretty(&build(SRC)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn every_foreign_key_referenced_table_precedes_the_referencing_table() {
    let plan = build(SRC);
    let position = |name: &str| plan.migration.tables.iter().position(|t| t.name == name).unwrap();

    for table in &plan.migration.tables {
        for column in &table.columns {
            if let Some(fk) = &column.references {
                assert!(
                    position(&fk.table) < position(&table.name)
                        || plan.migration.circular_dependencies.contains(&table.name),
                    "{} references {} but does not follow it in table order",
                    table.name,
                    fk.table
                );
            }
        }
    }
}

#[test]
fn view_joins_are_deduplicated_per_distinct_relation() {
    let plan = build(SRC);
    let view = &plan.views["TicketList"];
    // Two distinct relations (author, org) are referenced through fields,
    // so exactly two joins are produced.
    assert_eq!(view.joins.len(), 2);
    let aliases: std::collections::BTreeSet<&str> = view.joins.iter().map(|j| j.alias.as_str()).collect();
    assert_eq!(aliases, ["j_author", "j_org"].into_iter().collect());
}

#[test]
fn every_view_has_id_as_its_first_resolved_field() {
    let plan = build(SRC);
    let view = &plan.views["TicketList"];
    assert_eq!(view.fields[0].name, "id");
    assert_eq!(view.fields[0].sql, "t.id");
}
