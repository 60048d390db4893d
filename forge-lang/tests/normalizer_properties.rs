//! Normalizer invariants: re-normalizing identical input is deterministic,
//! and every `param.<name>` reference surfaces exactly once, in
//! first-occurrence order, in a view filter's parameter list.

use forge_lang::analyze::analyze;
use forge_lang::normalize::normalize;
use forge_lang::parser::parse;

fn normalize_twice(src: &str) -> (String, String) {
    let (file, _diags) = parse(src, "t.forge");
    let (scope, _analyze_diags) = analyze(&file);

    let mut diags1 = forge_lang::Diagnostics::new();
    let n1 = normalize(&file, &scope, &mut diags1);
    let mut diags2 = forge_lang::Diagnostics::new();
    let n2 = normalize(&file, &scope, &mut diags2);

    (format!("{n1:?}"), format!("{n2:?}"))
}

#[test]
fn normalizing_identical_input_twice_is_deterministic() {
    let src = r#"
        entity User { email: string unique }
        entity Ticket { subject: string status: enum(open, closed) = open }
        relation Ticket.author -> User
        access Ticket { read: user in author write: user == author }
        view TicketList { source: Ticket fields: subject, author.email where: param.b == param.a }
    "#;
    let (first, second) = normalize_twice(src);
    assert_eq!(first, second);
}

#[test]
fn view_filter_params_appear_once_in_first_occurrence_order() {
    let src = r#"
        entity Ticket { subject: string }
        view V {
            source: Ticket
            fields: subject
            where: param.b == param.a and param.b == param.c
        }
    "#;
    let (file, _diags) = parse(src, "t.forge");
    let (scope, _analyze_diags) = analyze(&file);
    let mut diagnostics = forge_lang::Diagnostics::new();
    let normalized = normalize(&file, &scope, &mut diagnostics);

    let view = normalized.views.iter().find(|v| v.name == "V").unwrap();
    let params = &view.filter.as_ref().unwrap().params;
    assert_eq!(params, &vec!["b".to_string(), "a".to_string(), "c".to_string()]);
}
