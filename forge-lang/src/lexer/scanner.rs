//! Lexer implementation.

use std::iter::Peekable;
use std::str::CharIndices;

use super::token::{lookup_keyword, Token, TokenKind};
use crate::diagnostics::{Diagnostics, DiagnosticCode};
use crate::position::{Position, Span};

/// Lexer for the FORGE specification language.
pub struct Lexer<'a> {
    source: &'a str,
    filename: String,
    chars: Peekable<CharIndices<'a>>,
    pos: Position,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, filename: impl Into<String>) -> Self {
        Self {
            source,
            filename: filename.into(),
            chars: source.char_indices().peekable(),
            pos: Position::start(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Tokenize the entire source, returning the token stream (always
    /// EOF-terminated) and any diagnostics raised along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, Diagnostics) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.pos.offset += c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(self.filename.clone(), start, self.pos)
    }

    fn next_token(&mut self) -> Token {
        self.skip_inline_whitespace();
        if let Some(tok) = self.scan_newline() {
            return tok;
        }
        if let Some(tok) = self.scan_comment() {
            return tok;
        }

        let start = self.pos;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ':' => self.single(TokenKind::Colon),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '.' => self.single(TokenKind::Dot),
                '+' => self.single(TokenKind::Plus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '=' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }
                '!' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ne
                    } else {
                        self.illegal(start, "unexpected character: !")
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                '-' => {
                    self.advance();
                    if self.peek_char() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else {
                        TokenKind::Minus
                    }
                }
                '"' => return self.scan_string(start),
                c if c.is_ascii_digit() => return self.scan_number(start),
                c if c.is_alphabetic() || c == '_' => return self.scan_identifier(start),
                other => {
                    self.advance();
                    self.illegal(start, format!("unexpected character: {other}"))
                }
            },
        };

        let literal = self.source[start.offset..self.pos.offset].to_string();
        Token::new(kind, literal, self.span_from(start))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn illegal(&mut self, start: Position, message: impl Into<String>) -> TokenKind {
        self.diagnostics.error(
            DiagnosticCode::ErrUnexpectedChar,
            message,
            self.span_from(start),
        );
        TokenKind::Illegal
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.advance();
        }
    }

    fn scan_newline(&mut self) -> Option<Token> {
        if self.peek_char() != Some('\n') {
            return None;
        }
        let start = self.pos;
        self.advance();
        Some(Token::new(TokenKind::Newline, "\n", self.span_from(start)))
    }

    fn scan_comment(&mut self) -> Option<Token> {
        let start = self.pos;
        match self.peek_char() {
            Some('/') => {
                let mut ahead = self.chars.clone();
                ahead.next();
                match ahead.peek() {
                    Some((_, '/')) => {
                        self.advance();
                        self.advance();
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                        let literal = self.source[start.offset..self.pos.offset].to_string();
                        Some(Token::new(TokenKind::Comment, literal, self.span_from(start)))
                    }
                    Some((_, '*')) => {
                        self.advance();
                        self.advance();
                        let mut closed = false;
                        while let Some(c) = self.peek_char() {
                            if c == '*' {
                                let mut ahead2 = self.chars.clone();
                                ahead2.next();
                                if matches!(ahead2.peek(), Some((_, '/'))) {
                                    self.advance();
                                    self.advance();
                                    closed = true;
                                    break;
                                }
                            }
                            self.advance();
                        }
                        if !closed {
                            self.diagnostics.error(
                                DiagnosticCode::ErrUnterminatedComment,
                                "unterminated block comment",
                                self.span_from(start),
                            );
                        }
                        let literal = self.source[start.offset..self.pos.offset].to_string();
                        Some(Token::new(TokenKind::Comment, literal, self.span_from(start)))
                    }
                    _ => None,
                }
            }
            Some('#') => {
                self.advance();
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                let literal = self.source[start.offset..self.pos.offset].to_string();
                Some(Token::new(TokenKind::Comment, literal, self.span_from(start)))
            }
            _ => None,
        }
    }

    fn scan_identifier(&mut self, start: Position) -> Token {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let literal = self.source[start.offset..self.pos.offset].to_string();
        let kind = lookup_keyword(&literal).unwrap_or(TokenKind::Ident);
        Token::new(kind, literal, self.span_from(start))
    }

    fn scan_number(&mut self, start: Position) -> Token {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.peek_char() == Some('.') {
            let mut ahead = self.chars.clone();
            ahead.next();
            if matches!(ahead.peek(), Some((_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }
        let literal = self.source[start.offset..self.pos.offset].to_string();
        let kind = if is_float { TokenKind::Float } else { TokenKind::Int };
        Token::new(kind, literal, self.span_from(start))
    }

    fn scan_string(&mut self, start: Position) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.diagnostics.error(
                        DiagnosticCode::ErrUnterminatedString,
                        "unterminated string literal",
                        self.span_from(start),
                    );
                    return Token::new(TokenKind::Illegal, value, self.span_from(start));
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    let esc_start = self.pos;
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            self.advance();
                            value.push('\n');
                        }
                        Some('t') => {
                            self.advance();
                            value.push('\t');
                        }
                        Some('r') => {
                            self.advance();
                            value.push('\r');
                        }
                        Some('\\') => {
                            self.advance();
                            value.push('\\');
                        }
                        Some('"') => {
                            self.advance();
                            value.push('"');
                        }
                        Some(other) => {
                            self.diagnostics.error(
                                DiagnosticCode::ErrInvalidEscape,
                                format!("invalid escape sequence: \\{other}"),
                                self.span_from(esc_start),
                            );
                            self.advance();
                            value.push(other);
                        }
                        None => {
                            self.diagnostics.error(
                                DiagnosticCode::ErrUnterminatedString,
                                "unterminated string literal",
                                self.span_from(start),
                            );
                            return Token::new(TokenKind::Illegal, value, self.span_from(start));
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        Token::new(TokenKind::Str, value, self.span_from(start))
    }
}

/// Tokenize `source`, attributing positions to `filename`.
pub fn tokenize(source: &str, filename: impl Into<String>) -> (Vec<Token>, Diagnostics) {
    Lexer::new(source, filename).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_yields_only_eof() {
        let (tokens, diags) = tokenize("", "t.forge");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
        assert!(diags.is_empty());
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, diags) = tokenize("entity Ticket { }", "t.forge");
        assert!(diags.is_empty());
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwEntity,
                TokenKind::Ident,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        let (tokens, _) = tokenize("== != <= >= ->", "t.forge");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Arrow,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_diagnosed() {
        let (tokens, diags) = tokenize("\"abc", "t.forge");
        assert!(diags.has_errors());
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn invalid_escape_is_diagnosed_but_recovers() {
        let (tokens, diags) = tokenize("\"a\\qb\"", "t.forge");
        assert!(diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::Str);
    }

    #[test]
    fn line_and_column_are_monotonic() {
        let (tokens, _) = tokenize("entity A {\n  x: int\n}", "t.forge");
        let mut last_offset = 0;
        for tok in &tokens {
            assert!(tok.span.start.offset >= last_offset);
            assert!(tok.span.end.offset >= tok.span.start.offset);
            last_offset = tok.span.start.offset;
        }
    }
}
