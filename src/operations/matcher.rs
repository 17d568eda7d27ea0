//! Operation overload matching.
//!
//! Candidates are narrowed one argument at a time. For argument `i`, each
//! surviving candidate scores the smallest ancestry distance from the actual
//! type to any type its parameter `i` accepts; unrelated candidates drop out
//! and only those with the best score are kept for the next argument.
//! Survivors keep registration order, so ties resolve to the earliest
//! registered operation (provided before built-in) with a warning.

use super::{Operation, OperationSnapshot, OperationWarning};
use crate::error::{DatError, Result};
use crate::lattice::TypeLattice;
use crate::types::TypeDescriptor;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OperationMatch {
    pub operation: Arc<Operation>,
    pub warning: Option<OperationWarning>,
}

pub struct OperationMatcher<'a> {
    operations: &'a OperationSnapshot,
    lattice: &'a TypeLattice,
}

impl<'a> OperationMatcher<'a> {
    pub fn new(operations: &'a OperationSnapshot, lattice: &'a TypeLattice) -> Self {
        Self { operations, lattice }
    }

    /// Pick the operation `name` best suited to the argument types.
    ///
    /// # Errors
    /// - [`DatError::NoSuchOperation`] when nothing has this name
    /// - [`DatError::ArityMismatch`] when no candidate takes this many arguments
    /// - [`DatError::NoMatchingOperation`] when the types eliminate every candidate
    pub fn find_operation(&self, name: &str, arg_types: &[TypeDescriptor]) -> Result<OperationMatch> {
        let mut candidates = self.operations.candidates(name);
        if candidates.is_empty() {
            return Err(DatError::NoSuchOperation(name.to_string()));
        }

        let arity = arg_types.len();
        candidates.retain(|op| op.arity() == arity);
        if candidates.is_empty() {
            return Err(DatError::ArityMismatch {
                name: name.to_string(),
                arity,
            });
        }

        for (i, actual) in arg_types.iter().enumerate() {
            let distances = self.lattice.distances(actual)?;
            let mut best = u32::MAX;
            let mut retained = Vec::with_capacity(candidates.len());

            for operation in candidates {
                let score = operation.parameters[i]
                    .types
                    .iter()
                    .filter_map(|accepted| distances.distance(accepted))
                    .min();
                match score {
                    Some(score) if score < best => {
                        best = score;
                        retained.clear();
                        retained.push(operation);
                    }
                    Some(score) if score == best => retained.push(operation),
                    _ => {}
                }
            }

            candidates = retained;
            if candidates.is_empty() {
                break;
            }
        }

        let mut survivors = candidates.into_iter();
        let Some(operation) = survivors.next() else {
            return Err(DatError::NoMatchingOperation {
                name: name.to_string(),
                arity,
            });
        };

        let others = survivors.len();
        let warning = (others > 0).then(|| {
            tracing::warn!(
                "Ambiguous operation {:?} with {} args: {} candidates, using {}",
                name,
                arity,
                others + 1,
                operation
            );
            OperationWarning::Ambiguous {
                name: name.to_string(),
                arity,
                candidates: others + 1,
                chosen: operation.to_string(),
            }
        });

        Ok(OperationMatch { operation, warning })
    }
}
