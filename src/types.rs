//! Core value types
//!
//! - [`TypeDescriptor`] names a host module type (`package:Name`)
//! - [`ConstantValue`] is a literal from an expression, with the folding
//!   arithmetic used by the resolver
//! - [`ArithmeticOp`] is one of the four operators that fold

use crate::error::{DatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies a module type in the host registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Package identifier, e.g. `org.vistrails.vistrails.basic`
    pub package: String,
    /// Module name inside the package, e.g. `Float`
    pub name: String,
}

impl TypeDescriptor {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.name)
    }
}

impl FromStr for TypeDescriptor {
    type Err = DatError;

    /// Parses `package:Name`. The package part may itself contain dots.
    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once(':') {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => {
                Ok(Self::new(package, name))
            }
            _ => Err(DatError::UnknownType(s.to_string())),
        }
    }
}

/// The four operators that constant folding understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    /// Map an operator name from the expression language.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "+" => Some(ArithmeticOp::Add),
            "-" => Some(ArithmeticOp::Sub),
            "*" => Some(ArithmeticOp::Mul),
            "/" => Some(ArithmeticOp::Div),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

/// A literal value.
///
/// Integers and floats share the numeric module type; the distinction only
/// affects folding and how the value is written into the literal module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
    String(String),
}

impl ConstantValue {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ConstantValue::String(_))
    }

    /// Numeric value as a float, `None` for strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantValue::Integer(i) => Some(*i as f64),
            ConstantValue::Float(f) => Some(*f),
            ConstantValue::String(_) => None,
        }
    }

    /// Fold `self op rhs`.
    ///
    /// Returns `Ok(None)` when the operands cannot be combined by this
    /// operator (e.g. a string times a number) or the result would not be a
    /// finite number; the caller then hands the expression to the operation
    /// matcher instead.
    pub fn apply(&self, op: ArithmeticOp, rhs: &ConstantValue) -> Result<Option<ConstantValue>> {
        use ConstantValue::*;

        match (self, rhs) {
            (String(a), String(b)) if op == ArithmeticOp::Add => {
                Ok(Some(String(format!("{a}{b}"))))
            }
            (String(_), _) | (_, String(_)) => Ok(None),
            (Integer(a), Integer(b)) if op != ArithmeticOp::Div => {
                let exact = match op {
                    ArithmeticOp::Add => a.checked_add(*b),
                    ArithmeticOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                match exact {
                    Some(v) => Ok(Some(Integer(v))),
                    // Overflow promotes to float
                    None => Self::apply_float(op, *a as f64, *b as f64),
                }
            }
            (lhs, rhs) => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => Self::apply_float(op, a, b),
                _ => Ok(None),
            },
        }
    }

    fn apply_float(op: ArithmeticOp, a: f64, b: f64) -> Result<Option<ConstantValue>> {
        let value = match op {
            ArithmeticOp::Add => a + b,
            ArithmeticOp::Sub => a - b,
            ArithmeticOp::Mul => a * b,
            ArithmeticOp::Div => {
                if b == 0.0 {
                    return Err(DatError::DivisionByZero);
                }
                a / b
            }
        };
        // inf and NaN have no literal form
        Ok(value.is_finite().then_some(ConstantValue::Float(value)))
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Integer(i) => write!(f, "{i}"),
            ConstantValue::Float(v) => write!(f, "{v}"),
            ConstantValue::String(s) => write!(f, "{s}"),
        }
    }
}
