//! End-to-end scenarios with literal inputs and expected outputs, lifted
//! straight from the pipeline's worked examples: one test per scenario,
//! driven through the public `forge_lang::compile` entry point wherever
//! the artifact text itself is under test, and through the planner
//! directly where the assertion is about `Plan` structure.

use forge_lang::analyze::analyze;
use forge_lang::normalize::normalize;
use forge_lang::parser::parse;
use forge_lang::{compile, plan};

fn build_plan(src: &str) -> (forge_core::Plan, forge_lang::Diagnostics) {
    let (file, mut diagnostics) = parse(src, "t.forge");
    let (scope, analyze_diagnostics) = analyze(&file);
    diagnostics.merge(analyze_diagnostics);
    let normalized = normalize(&file, &scope, &mut diagnostics);
    let plan = plan(&scope, &normalized, "v1", &mut diagnostics);
    (plan, diagnostics)
}

#[test]
fn scenario_1_enum_default() {
    let src = "entity Ticket { status: enum(open, closed) = open }";
    let (output, diagnostics) = compile(src, "t.forge", "v1");
    assert!(!diagnostics.has_errors());

    let (plan, _) = build_plan(src);
    let table = &plan.migration.tables[0];
    let status = table.columns.iter().find(|c| c.name == "status").unwrap();
    assert_eq!(status.sql_type, "tickets_status");
    assert!(!status.nullable);
    assert_eq!(status.default.as_ref().unwrap().to_sql_default(), "'open'");

    assert!(output.schema_sql.contains("AS ENUM ('open', 'closed')"));
    assert!(output.schema_sql.contains("tickets_status DEFAULT 'open'"));
}

#[test]
fn scenario_2_relation_foreign_key() {
    let src = r#"
        entity User { email: string unique }
        entity Ticket { subject: string }
        relation Ticket.author -> User
    "#;
    let (plan, diagnostics) = build_plan(src);
    assert!(!diagnostics.has_errors());

    assert_eq!(plan.migration.tables.len(), 2);
    assert_eq!(plan.migration.tables[0].name, "users");
    assert_eq!(plan.migration.tables[1].name, "tickets");

    let ticket_table = &plan.migration.tables[1];
    let fk_column = ticket_table.columns.iter().find(|c| c.name == "author_id").unwrap();
    assert_eq!(fk_column.sql_type, "uuid");
    let fk = fk_column.references.as_ref().unwrap();
    assert_eq!(fk.table, "users");
    assert_eq!(fk.column, "id");

    assert_eq!(
        plan.migration
            .indexes
            .iter()
            .filter(|i| i.table == "users" && i.column == "email" && i.unique)
            .count(),
        1
    );
    assert_eq!(
        plan.migration
            .indexes
            .iter()
            .filter(|i| i.table == "tickets" && i.column == "author_id" && !i.unique)
            .count(),
        1
    );
}

#[test]
fn scenario_3_access_policy() {
    let src = r#"
        entity User { name: string }
        entity Ticket { subject: string }
        relation Ticket.author -> User
        access Ticket { read: user in org.members write: user == author }
    "#;
    let (plan, diagnostics) = build_plan(src);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());

    let read_policy = plan
        .migration
        .policies
        .iter()
        .find(|p| p.name == "tickets_read_policy")
        .unwrap();
    assert_eq!(read_policy.table, "tickets");
    assert_eq!(read_policy.command, forge_core::PolicyCommand::Select);
    assert!(read_policy.check_sql.is_none());

    let write_policy = plan
        .migration
        .policies
        .iter()
        .find(|p| p.name == "tickets_write_policy")
        .unwrap();
    assert_eq!(write_policy.command, forge_core::PolicyCommand::All);
    assert_eq!(write_policy.check_sql.as_deref(), Some(write_policy.using_sql.as_str()));
}

#[test]
fn scenario_4_view_with_joined_field() {
    let src = r#"
        entity User { name: string }
        entity Ticket { subject: string }
        relation Ticket.author -> User
        view TicketList { source: Ticket fields: subject, author.name }
    "#;
    let (plan, diagnostics) = build_plan(src);
    assert!(!diagnostics.has_errors());

    let view = &plan.views["TicketList"];
    assert_eq!(view.fields[0].name, "id");
    assert_eq!(view.fields[0].sql, "t.id");
    assert_eq!(view.fields[1].sql, "t.subject");
    assert_eq!(view.fields[2].sql, "j_author.name");

    assert_eq!(view.joins.len(), 1);
    assert_eq!(view.joins[0].table, "users");
    assert_eq!(view.joins[0].alias, "j_author");
    assert_eq!(view.joins[0].on, "j_author.id = t.author_id");

    assert_eq!(view.default_sort[0].column, "t.created_at");
    assert!(view.default_sort[0].descending);
    assert_eq!(view.default_sort[1].column, "t.id");
}

#[test]
fn scenario_5_rule_predicate() {
    let src = r#"
        entity Ticket { status: enum(open, closed) = open }
        rule Ticket.update { forbid if status == closed emit TICKET_CLOSED }
        message TICKET_CLOSED { severity: error text: "ticket is closed" }
        action CloseTicket { operation: update target: Ticket input: Ticket }
    "#;
    let (plan, diagnostics) = build_plan(src);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());

    let action = &plan.actions["CloseTicket"];
    assert_eq!(action.rules.len(), 1);
    assert_eq!(action.rules[0].predicate_sql, "NOT (status = closed)");
    assert_eq!(action.rules[0].emit_code.as_deref(), Some("TICKET_CLOSED"));
}

#[test]
fn hook_wires_a_post_hook_job_onto_its_matching_action() {
    let src = r#"
        entity Ticket { subject: string }
        job SendMail { input: Ticket effect: email.send }
        hook Ticket.after_create { emit: SendMail }
        action CreateTicket { operation: create target: Ticket input: Ticket }
    "#;
    let (plan, diagnostics) = build_plan(src);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.iter().collect::<Vec<_>>());

    let action = &plan.actions["CreateTicket"];
    assert!(action.pre_hooks.is_empty());
    assert_eq!(action.post_hooks, vec!["SendMail".to_string()]);

    assert_eq!(plan.hooks.len(), 1);
    assert_eq!(plan.hooks[0].entity, "Ticket");
    assert_eq!(plan.hooks[0].timing, forge_core::HookTiming::After);
    assert_eq!(plan.hooks[0].operation, forge_core::Operation::Create);
    assert_eq!(plan.hooks[0].jobs, vec!["SendMail".to_string()]);
}
