//! Recursive-descent parser.
//!
//! ```text
//! statement := SYMBOL '=' expr
//! expr      := term (('+' | '-') term)*
//! term      := unary (('*' | '/') unary)*
//! unary     := '-' unary | primary
//! primary   := NUMBER | STRING | SYMBOL | SYMBOL '(' [expr (',' expr)*] ')' | '(' expr ')'
//! ```

use super::lexer::{Token, TokenKind};
use super::{Expr, ParseError};
use crate::types::ConstantValue;

pub struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    /// Length of the source text, used to report errors at end of input
    end: usize,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    pub fn parse_statement(&mut self) -> Result<(String, Expr), ParseError> {
        let target = match (self.tokens.first(), self.tokens.get(1)) {
            (
                Some(Token {
                    kind: TokenKind::Symbol(name),
                    ..
                }),
                Some(Token {
                    kind: TokenKind::Equals,
                    ..
                }),
            ) => name.clone(),
            _ => {
                return Err(ParseError::new(
                    0,
                    "missing target: expected `name = expression`",
                ))
            }
        };
        self.pos = 2;

        let expr = self.parse_expr()?;
        if let Some(token) = self.peek() {
            return Err(ParseError::new(
                token.position,
                format!("unexpected {}", describe(&token.kind)),
            ));
        }
        Ok((target, expr))
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(())
            }
            Some(token) => Err(ParseError::new(
                token.position,
                format!("expected {}, found {}", what, describe(&token.kind)),
            )),
            None => Err(ParseError::new(
                self.end,
                format!("expected {}, found end of input", what),
            )),
        }
    }

    fn next_op(&self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) if ops.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.next_op(&['+', '-']) {
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Expr::op(op.to_string(), vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.next_op(&['*', '/']) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::op(op.to_string(), vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.next_op(&['-']).is_none() {
            return self.parse_primary();
        }
        self.pos += 1;
        match self.parse_unary()? {
            Expr::Number(ConstantValue::Integer(i)) => match i.checked_neg() {
                Some(negated) => Ok(Expr::Number(ConstantValue::Integer(negated))),
                None => Ok(Expr::Number(ConstantValue::Float(-(i as f64)))),
            },
            Expr::Number(ConstantValue::Float(f)) => Ok(Expr::Number(ConstantValue::Float(-f))),
            // -x is 0 - x
            operand => Ok(Expr::op(
                "-",
                vec![Expr::Number(ConstantValue::Integer(0)), operand],
            )),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        let Some(token) = self.advance() else {
            return Err(ParseError::new(position, "unexpected end of input"));
        };

        match &token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value.clone())),
            TokenKind::Str(value) => Ok(Expr::Str(value.clone())),
            TokenKind::Symbol(name) => {
                if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen)) {
                    return Ok(Expr::Symbol(name.clone()));
                }
                self.pos += 1;
                let mut args = Vec::new();
                if !matches!(self.peek().map(|t| &t.kind), Some(TokenKind::RParen)) {
                    loop {
                        args.push(self.parse_expr()?);
                        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr::op(name.clone(), args))
            }
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            other => Err(ParseError::new(
                token.position,
                format!("unexpected {}", describe(other)),
            )),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Symbol(name) => format!("symbol {:?}", name),
        TokenKind::Number(value) => format!("number {}", value),
        TokenKind::Str(value) => format!("string {:?}", value),
        TokenKind::Op(op) => format!("operator `{}`", op),
        TokenKind::LParen => "`(`".to_string(),
        TokenKind::RParen => "`)`".to_string(),
        TokenKind::Comma => "`,`".to_string(),
        TokenKind::Equals => "`=`".to_string(),
    }
}
