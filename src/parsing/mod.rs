//! Expression language for deriving variables.
//!
//! An expression assigns a new variable from existing ones:
//!
//! ```text
//! total = (a + b) * 2
//! label = "run " + "one"
//! smooth = lowpass(signal, 10.0)
//! ```
//!
//! Parsing has no side effects. Names are resolved later by the operation
//! resolver.

mod lexer;
mod parser;

pub use lexer::{tokenize, Token, TokenKind};

use crate::types::ConstantValue;
use std::fmt;
use thiserror::Error;

/// Expression syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to an existing variable
    Symbol(String),
    Number(ConstantValue),
    Str(String),
    /// Operator or named operation applied to arguments
    Op { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn op(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Op {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(name) => write!(f, "{name}"),
            Expr::Number(value) => write!(f, "{value}"),
            Expr::Str(value) => write!(f, "{value:?}"),
            Expr::Op { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Malformed expression text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at offset {position})")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Parse `target = expression`.
pub fn parse_expression(text: &str) -> Result<(String, Expr), ParseError> {
    let tokens = tokenize(text)?;
    parser::Parser::new(&tokens, text.len()).parse_statement()
}

/// Whether `name` can be used as a variable name in expressions.
pub fn is_valid_variable_name(name: &str) -> bool {
    matches!(
        tokenize(name).as_deref(),
        Ok([Token {
            kind: TokenKind::Symbol(_),
            ..
        }])
    )
}
