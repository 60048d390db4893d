//! Lexer module for the FORGE specification language.

pub mod scanner;
pub mod token;

pub use scanner::{tokenize, Lexer};
pub use token::{lookup_keyword, Token, TokenKind};
