//! Provenance records
//!
//! Each variable remembers how its value was produced: a literal, an
//! operation applied to other variables (recursively), or a loader.

use crate::types::ConstantValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of the operation that produced a variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRef {
    pub name: String,
    pub package: String,
    /// Accepted types per parameter, e.g. `["basic:Float", "basic:Float"]`
    pub signature: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Constant {
        value: ConstantValue,
    },
    Operation {
        operation: OperationRef,
        /// Provenance of each argument, in parameter order; `None` when the
        /// argument did not record any
        arguments: Vec<Option<Provenance>>,
    },
    Loader {
        loader: String,
        #[serde(default)]
        parameters: BTreeMap<String, String>,
    },
}

impl Provenance {
    pub fn loader(loader: impl Into<String>) -> Self {
        Provenance::Loader {
            loader: loader.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Number of operation applications in this record.
    pub fn operation_count(&self) -> usize {
        match self {
            Provenance::Operation { arguments, .. } => {
                1 + arguments
                    .iter()
                    .flatten()
                    .map(Provenance::operation_count)
                    .sum::<usize>()
            }
            _ => 0,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Constant {
                value: ConstantValue::String(s),
            } => write!(f, "{s:?}"),
            Provenance::Constant { value } => write!(f, "{value}"),
            Provenance::Operation {
                operation,
                arguments,
            } => {
                write!(f, "{}(", operation.name)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match argument {
                        Some(provenance) => write!(f, "{provenance}")?,
                        None => write!(f, "?")?,
                    }
                }
                write!(f, ")")
            }
            Provenance::Loader { loader, parameters } => {
                write!(f, "{loader}[")?;
                for (i, (key, value)) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                write!(f, "]")
            }
        }
    }
}
