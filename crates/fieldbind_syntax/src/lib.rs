//! Syntax layer for fieldbind.
//!
//! Parses the executable subset of GraphQL (operations, fragments,
//! selection sets, arguments and values) into an owned syntax tree:
//! - `token`: Token kinds
//! - `lexer`: Tokenization
//! - `ast`: Syntax tree types
//! - `parser`: Recursive descent parser
//! - `error`: Diagnostics with source spans

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::*;
pub use error::SyntaxError;
pub use lexer::Lexer;
pub use parser::{parse, ParseResult};
pub use span::Span;
pub use token::{Token, TokenKind};
