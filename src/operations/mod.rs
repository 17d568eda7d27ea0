//! Variable operations
//!
//! An [`Operation`] derives a new variable from existing ones. Packages
//! contribute operations through an [`OperationProvider`]; DAT itself ships
//! arithmetic and string concatenation in [`builtins`].
//!
//! # Pipeline
//!
//! ```text
//! text ──parse──► Expr ──resolve──► ComputeNode ──execute──► Variable ──materialize──► version
//!                        (matcher,                (callbacks,
//!                         folding)                 subworkflows)
//! ```
//!
//! # Implementations
//!
//! - [`OperationImpl::Callback`] - a function building the result variable
//! - [`OperationImpl::Subworkflow`] - a pipeline template whose InputPort
//!   modules are named after the parameters and whose single OutputPort
//!   carries the result

pub mod builtins;
pub mod execution;
pub mod matcher;
pub mod registry;
pub mod resolver;

pub use execution::{apply_operation, execute};
pub use matcher::{OperationMatch, OperationMatcher};
pub use registry::{global, OperationProvider, OperationRegistry, OperationSnapshot};
pub use resolver::{ComputeNode, Resolver, VariableLookup};

use crate::error::Result;
use crate::host::{Controller, Pipeline};
use crate::pipeline::expand_package_dir;
use crate::provenance::OperationRef;
use crate::types::TypeDescriptor;
use crate::variable::Variable;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Builds the result variable from the argument variables.
///
/// Returning `Ok(None)` is an implementation error.
pub type OperationCallback =
    Arc<dyn Fn(&mut Controller<'_>, Vec<Variable>) -> Result<Option<Variable>> + Send + Sync>;

/// A named parameter and the types it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationParameter {
    pub name: String,
    pub types: Vec<TypeDescriptor>,
}

impl OperationParameter {
    pub fn new(name: impl Into<String>, types: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            types: types.into_iter().collect(),
        }
    }
}

#[derive(Clone)]
pub enum OperationImpl {
    Callback(OperationCallback),
    Subworkflow(Arc<Pipeline>),
}

#[derive(Clone)]
pub struct Operation {
    pub name: String,
    /// Package that provided the operation
    pub package: String,
    pub parameters: Vec<OperationParameter>,
    pub return_type: TypeDescriptor,
    /// Whether the operation can be invoked from expressions
    pub usable_in_command: bool,
    pub implementation: OperationImpl,
}

impl Operation {
    pub fn with_callback<F>(
        name: impl Into<String>,
        parameters: Vec<OperationParameter>,
        return_type: TypeDescriptor,
        callback: F,
    ) -> Self
    where
        F: Fn(&mut Controller<'_>, Vec<Variable>) -> Result<Option<Variable>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            package: String::new(),
            parameters,
            return_type,
            usable_in_command: true,
            implementation: OperationImpl::Callback(Arc::new(callback)),
        }
    }

    pub fn with_subworkflow(
        name: impl Into<String>,
        parameters: Vec<OperationParameter>,
        return_type: TypeDescriptor,
        template: Pipeline,
    ) -> Self {
        Self {
            name: name.into(),
            package: String::new(),
            parameters,
            return_type,
            usable_in_command: true,
            implementation: OperationImpl::Subworkflow(Arc::new(template)),
        }
    }

    /// Subworkflow operation whose template path may contain `{package_dir}`.
    pub fn load_subworkflow(
        name: impl Into<String>,
        parameters: Vec<OperationParameter>,
        return_type: TypeDescriptor,
        template_path: &str,
        package_dir: &Path,
    ) -> Result<Self> {
        let template = Pipeline::load(expand_package_dir(template_path, package_dir))?;
        Ok(Self::with_subworkflow(name, parameters, return_type, template))
    }

    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn usable_in_command(mut self, usable: bool) -> Self {
        self.usable_in_command = usable;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Provenance identity of this operation.
    pub fn reference(&self) -> OperationRef {
        OperationRef {
            name: self.name.clone(),
            package: self.package.clone(),
            signature: self
                .parameters
                .iter()
                .map(|p| {
                    p.types
                        .iter()
                        .map(TypeDescriptor::to_string)
                        .collect::<Vec<_>>()
                        .join("|")
                })
                .collect(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let implementation = match self.implementation {
            OperationImpl::Callback(_) => "callback",
            OperationImpl::Subworkflow(_) => "subworkflow",
        };
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("package", &self.package)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("usable_in_command", &self.usable_in_command)
            .field("implementation", &implementation)
            .finish()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: ", parameter.name)?;
            for (j, ty) in parameter.types.iter().enumerate() {
                if j > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{ty}")?;
            }
        }
        write!(f, ") -> {}", self.return_type)
    }
}

/// Non-fatal conditions reported by `perform_operation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationWarning {
    /// More than one candidate survived matching; the first was used
    Ambiguous {
        name: String,
        arity: usize,
        candidates: usize,
        chosen: String,
    },
}

impl fmt::Display for OperationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationWarning::Ambiguous {
                name,
                arity,
                candidates,
                chosen,
            } => write!(
                f,
                "Ambiguous operation {:?} with {} args: {} candidates matched, using {}",
                name, arity, candidates, chosen
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float() -> TypeDescriptor {
        TypeDescriptor::new("basic", "Float")
    }

    #[test]
    fn test_display_signature() {
        let op = Operation::with_callback(
            "mix",
            vec![
                OperationParameter::new("a", [float()]),
                OperationParameter::new("b", [float(), TypeDescriptor::new("basic", "String")]),
            ],
            float(),
            |_, _| Ok(None),
        );
        assert_eq!(op.to_string(), "mix(a: basic:Float, b: basic:Float | basic:String) -> basic:Float");
        assert_eq!(op.arity(), 2);
        assert!(op.usable_in_command);
    }

    #[test]
    fn test_reference() {
        let op = Operation::with_subworkflow("id", vec![OperationParameter::new("x", [float()])], float(), Pipeline::new())
            .in_package("org.example");
        let reference = op.reference();
        assert_eq!(reference.package, "org.example");
        assert_eq!(reference.signature, vec!["basic:Float".to_string()]);
    }

    #[test]
    fn test_debug_hides_callback() {
        let op = Operation::with_callback("f", vec![], float(), |_, _| Ok(None));
        assert!(format!("{op:?}").contains("callback"));
    }

    #[test]
    fn test_load_subworkflow_expands_package_dir() {
        let dir = tempfile::tempdir().unwrap();
        Pipeline::new().save(dir.path().join("identity.json")).unwrap();

        let op = Operation::load_subworkflow(
            "identity",
            vec![],
            float(),
            "{package_dir}/identity.json",
            dir.path(),
        )
        .unwrap();
        assert!(matches!(op.implementation, OperationImpl::Subworkflow(_)));

        assert!(Operation::load_subworkflow("x", vec![], float(), "{package_dir}/missing.json", dir.path()).is_err());
    }
}
