//! Factor-language syntax: lexer, tagged AST, parser.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{
    body_has_loop_exit, BinOpKind, CmpOpKind, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOpKind,
};
pub use lexer::{tokenize, LexError, Tok, Token};
pub use parser::{parse, ParseError};
