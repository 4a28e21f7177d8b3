//! Lexer, parser, AST, and pretty printer for Verifpal protocol models.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod pretty;
pub mod token;

pub use ast::*;
pub use lexer::Lexer;
pub use parser::{parse, validate_file_name, ParseError, ParseResult, Parser};
pub use pretty::{pretty_diagram, pretty_print, pretty_query, pretty_value};
pub use token::{Span, Token, TokenKind};
