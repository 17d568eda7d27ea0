//! Error handling for DAT
//!
//! This module defines the error taxonomy shared by the parser, the operation
//! resolver, the materializer and the recipe compiler, plus a Result alias.

use crate::host::ModuleId;
use crate::parsing::ParseError;
use thiserror::Error;

/// Main error type for DAT operations
#[derive(Error, Debug)]
pub enum DatError {
    /// Malformed expression text
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A variable with this name is already known
    #[error("Target variable {0:?} already exists")]
    DuplicateVariable(String),

    /// An expression referenced a variable that does not exist
    #[error("Unknown variable {0:?}")]
    UnknownVariable(String),

    /// A name that cannot be used as a variable name
    #[error("Invalid variable name {0:?}")]
    InvalidVariableName(String),

    /// No registered or built-in operation has this name
    #[error("There is no operation {0:?}")]
    NoSuchOperation(String),

    /// Operations with this name exist, but none take this many arguments
    #[error("There is no operation {name:?} with {arity} arguments")]
    ArityMismatch { name: String, arity: usize },

    /// Every candidate was eliminated by the argument types
    #[error("Found no match for operation {name:?} with given {arity} args")]
    NoMatchingOperation { name: String, arity: usize },

    /// An operation implementation failed to produce a variable
    #[error("Package error in operation {operation:?}: {message}")]
    OperationImplementation { operation: String, message: String },

    /// Constant folding divided by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A module type the registry does not know
    #[error("Unknown module type {0}")]
    UnknownType(String),

    /// Materialization was requested before an output port was selected
    #[error("No output port was selected for this variable")]
    OutputNotDesignated,

    /// `select_output_port` was called a second time
    #[error("select_output_port() was called more than once")]
    OutputAlreadyDesignated,

    /// A module handle that belongs to another variable
    #[error("Module {0} does not belong to this variable")]
    ForeignModule(ModuleId),

    /// The variable has no committed version yet
    #[error("Variable {0:?} is not materialized")]
    NotMaterialized(String),

    /// A recipe does not fit its plot
    #[error("Recipe error: {0}")]
    Recipe(String),

    /// A script command with the wrong shape
    #[error("Script usage: {0}")]
    ScriptUsage(String),

    /// The host graph store rejected an operation
    #[error("Host error: {0}")]
    Host(String),

    /// Operation registry misuse (e.g. registering after sealing)
    #[error("Registry error: {0}")]
    Registry(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The workspace lock was poisoned by a panicking holder
    #[error("Workspace lock poisoned")]
    LockPoisoned,

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DatError>,
    },
}

impl DatError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DatError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with every context layer peeled off
    pub fn root_cause(&self) -> &DatError {
        match self {
            DatError::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Build an implementation error for the named operation
    pub fn implementation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        DatError::OperationImplementation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DatError {
    fn from(err: serde_json::Error) -> Self {
        DatError::Serialization(err.to_string())
    }
}

/// Result type alias for DAT operations
pub type Result<T> = std::result::Result<T, DatError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DatError::UnknownVariable("temperature".to_string());
        assert_eq!(err.to_string(), "Unknown variable \"temperature\"");
    }

    #[test]
    fn test_error_with_context() {
        let err = DatError::DivisionByZero;
        let with_ctx = err.with_context("Failed to fold constants");
        assert!(with_ctx.to_string().contains("Failed to fold constants"));
        assert!(matches!(with_ctx.root_cause(), DatError::DivisionByZero));
    }

    #[test]
    fn test_arity_mismatch_message() {
        let err = DatError::ArityMismatch {
            name: "f".to_string(),
            arity: 3,
        };
        assert!(err.to_string().contains("3 arguments"));
    }

    #[test]
    fn test_result_ext_lazy_context() {
        let result: Result<()> = Err(DatError::NoSuchOperation("g".to_string()));
        let err = result.with_context(|| "resolving g".to_string()).unwrap_err();
        assert!(err.to_string().starts_with("resolving g"));
    }
}
