//! Parser invariants: totality, declaration-count fidelity, and the
//! worked precedence example from the testable-properties section.

use forge_lang::parser::{parse, BinOp, Decl, ExprKind};

#[test]
fn parsing_is_total_even_with_malformed_input() {
    let sources = [
        "",
        "entity",
        "entity Ticket {",
        "rule .update { forbid if }",
        "###garbage###",
    ];
    for src in sources {
        let (file, _diagnostics) = parse(src, "t.forge");
        // Totality: parsing always returns, regardless of how many
        // declarations it managed to recover.
        let _ = file.decls.len();
    }
}

#[test]
fn declaration_count_is_faithful_to_source_order() {
    let src = r#"
        entity User { email: string unique }
        entity Ticket { subject: string }
        relation Ticket.author -> User
        access Ticket { read: user == author }
    "#;
    let (file, diagnostics) = parse(src, "t.forge");
    assert!(!diagnostics.has_errors());
    assert_eq!(file.decls.len(), 4);
    assert!(matches!(file.decls[0], Decl::Entity(_)));
    assert!(matches!(file.decls[1], Decl::Entity(_)));
    assert!(matches!(file.decls[2], Decl::Relation(_)));
    assert!(matches!(file.decls[3], Decl::Access(_)));
}

#[test]
fn expression_precedence_matches_worked_example() {
    // `a or b and c == d`: root is `or`; left is `a`; right is `and`,
    // whose right is `==` of `c, d`.
    let src = "rule Ticket.update { forbid if a or b and c == d }";
    let (file, diagnostics) = parse(src, "t.forge");
    assert!(!diagnostics.has_errors());

    let Decl::Rule(rule) = &file.decls[0] else {
        panic!("expected a rule declaration");
    };
    let root = &rule.clauses[0].condition;
    let ExprKind::Binary { left, op, right } = &root.kind else {
        panic!("expected a binary root, got {:?}", root.kind);
    };
    assert_eq!(*op, BinOp::Or);
    assert!(matches!(left.kind, ExprKind::Ident(ref n) if n == "a"));

    let ExprKind::Binary { left: and_left, op: and_op, right: and_right } = &right.kind else {
        panic!("expected the right child to be `and`, got {:?}", right.kind);
    };
    assert_eq!(*and_op, BinOp::And);
    assert!(matches!(and_left.kind, ExprKind::Ident(ref n) if n == "b"));

    let ExprKind::Binary { left: eq_left, op: eq_op, right: eq_right } = &and_right.kind else {
        panic!("expected the `and`'s right child to be `==`, got {:?}", and_right.kind);
    };
    assert_eq!(*eq_op, BinOp::Eq);
    assert!(matches!(eq_left.kind, ExprKind::Ident(ref n) if n == "c"));
    assert!(matches!(eq_right.kind, ExprKind::Ident(ref n) if n == "d"));
}

#[test]
fn hook_target_parses_the_underscore_joined_lifecycle_word() {
    let src = "hook Ticket.after_create { emit: SendMail }";
    let (file, diagnostics) = parse(src, "t.forge");
    assert!(!diagnostics.has_errors());
    assert_eq!(file.decls.len(), 1);

    let Decl::Hook(hook) = &file.decls[0] else {
        panic!("expected a hook declaration, got {:?}", file.decls[0]);
    };
    assert_eq!(hook.target_entity, "Ticket");
    assert_eq!(hook.timing, "after");
    assert_eq!(hook.operation, "create");
    assert_eq!(hook.enqueue, vec!["SendMail".to_string()]);
}

#[test]
fn hook_target_rejects_an_unrecognized_lifecycle_word() {
    let src = "hook Ticket.sideways_create { emit: SendMail }";
    let (file, diagnostics) = parse(src, "t.forge");
    assert!(diagnostics.has_errors());
    assert!(file.decls.is_empty());
}
