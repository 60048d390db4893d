//! Parser module for the FORGE specification language.

pub mod ast;
pub mod parser;

pub use ast::*;
pub use parser::{parse, Parser};
