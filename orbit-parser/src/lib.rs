pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{BinaryOp, Expr, Program, Span, Stmt, UnaryOp};
pub use error::ParseError;
pub use parser::parse_program;
