//! Tokenizer for variable expressions.

use super::ParseError;
use crate::types::ConstantValue;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Symbol(String),
    Number(ConstantValue),
    Str(String),
    /// One of `+ - * /`
    Op(char),
    LParen,
    RParen,
    Comma,
    Equals,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub position: usize,
}

pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' | '-' | '*' | '/' => {
                chars.next();
                TokenKind::Op(c)
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            ',' => {
                chars.next();
                TokenKind::Comma
            }
            '=' => {
                chars.next();
                TokenKind::Equals
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, escaped)) => value.push(escaped),
                            None => break,
                        },
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(ParseError::new(position, "unterminated string literal"));
                }
                TokenKind::Str(value)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = position;
                let mut prev = c;
                while let Some(&(i, ch)) = chars.peek() {
                    let exponent_sign = (ch == '+' || ch == '-') && (prev == 'e' || prev == 'E');
                    if ch.is_ascii_alphanumeric() || ch == '.' || exponent_sign {
                        end = i + ch.len_utf8();
                        prev = ch;
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Number(parse_number(&text[position..end], position)?)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = position;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Symbol(text[position..end].to_string())
            }
            other => {
                return Err(ParseError::new(
                    position,
                    format!("unexpected character {:?}", other),
                ))
            }
        };
        tokens.push(Token { kind, position });
    }

    Ok(tokens)
}

fn parse_number(literal: &str, position: usize) -> Result<ConstantValue, ParseError> {
    let is_float = literal.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(value) = literal.parse::<i64>() {
            return Ok(ConstantValue::Integer(value));
        }
    }
    literal
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(ConstantValue::Float)
        .ok_or_else(|| ParseError::new(position, format!("invalid number {:?}", literal)))
}
