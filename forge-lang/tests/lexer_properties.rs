//! Lexer invariants from the testable-properties section: position
//! monotonicity and the empty-source edge case.

use forge_lang::lexer::{tokenize, TokenKind};

#[test]
fn empty_source_yields_only_eof_with_no_diagnostics() {
    let (tokens, diagnostics) = tokenize("", "t.forge");
    assert!(diagnostics.is_empty());
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Eof);
}

#[test]
fn positions_are_monotonic_and_well_formed() {
    let src = r#"
        entity Ticket {
            subject: string
            status: enum(open, closed) = open
        }
        rule Ticket.update { forbid if status == closed emit X }
    "#;
    let (tokens, _diagnostics) = tokenize(src, "t.forge");

    let mut prev_end_offset = 0;
    for token in &tokens {
        assert!(
            token.span.end.offset >= token.span.start.offset,
            "token {:?} ends before it starts",
            token
        );
        assert!(
            token.span.start.offset >= prev_end_offset,
            "token {:?} starts before the previous token ended",
            token
        );
        prev_end_offset = token.span.end.offset;
    }
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
}

#[test]
fn token_literals_concatenate_back_to_source_modulo_whitespace() {
    let src = "entity Ticket { subject: string status: enum(open, closed) = open }";
    let (tokens, diagnostics) = tokenize(src, "t.forge");
    assert!(diagnostics.is_empty());

    let rebuilt: String = tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.literal.as_str())
        .collect();
    let stripped_src: String = src.chars().filter(|c| !c.is_whitespace()).collect();
    assert_eq!(rebuilt, stripped_src);
}
