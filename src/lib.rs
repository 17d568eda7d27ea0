//! # DAT: Variable and Plot Pipeline Synthesis
//!
//! DAT lets a user of a versioned dataflow workflow system work with named
//! *variables* (subgraphs producing one value) and *plots* (pipeline
//! templates with parameter sockets) instead of hand-wiring pipelines.
//!
//! ## Architecture
//!
//! - **Parsing**: `name = expression` text into an [`Expr`] tree
//! - **Operations**: overload matching over the module type lattice, constant
//!   folding, callback and subworkflow implementations
//! - **Variables**: buffered graph edits materialized as tagged versions
//!   under a common variables root
//! - **Pipelines**: recipes compiled into standalone pipeline versions
//! - **Host**: the version store, type registry and execution engine DAT
//!   drives, behind traits with in-memory implementations
//!
//! ## Configuration
//!
//! Settings (package identifiers, tag and port names, log filter) are read
//! from `dat.toml` in the platform configuration directory under
//! `dev.dat.dat-rs`:
//!
//! - **Linux**: `~/.config/dev.dat.dat-rs/`
//! - **macOS**: `~/Library/Application Support/dev.dat.dat-rs/`
//! - **Windows**: `%APPDATA%\dev.dat.dat-rs\`
//!
//! ## Example
//!
//! ```
//! use dat_rs::{
//!     config::DatConfig,
//!     host::{MemoryVistrail, ModuleRegistry},
//!     operations::OperationRegistry,
//!     Workspace,
//! };
//! use std::sync::Arc;
//!
//! let config = DatConfig::default();
//! let registry = Arc::new(ModuleRegistry::with_basic_package(&config));
//! let operations = OperationRegistry::with_builtins(&config).snapshot();
//! let workspace = Workspace::new(Box::new(MemoryVistrail::new()), registry, operations, config);
//!
//! workspace.perform_operation("a = 2 + 3").unwrap();
//! workspace.perform_operation("b = a * 2").unwrap();
//! assert_eq!(workspace.variable_names().unwrap(), vec!["a", "b"]);
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod lattice;
pub mod loaders;
pub mod operations;
pub mod parsing;
pub mod pipeline;
pub mod provenance;
pub mod script;
pub mod types;
pub mod variable;
pub mod workspace;

// Re-export commonly used types
pub use config::DatConfig;
pub use error::{DatError, Result};
pub use operations::{Operation, OperationParameter, OperationProvider, OperationWarning};
pub use parsing::Expr;
pub use pipeline::{Plot, PlotPort, Recipe};
pub use types::{ConstantValue, TypeDescriptor};
pub use variable::{ModuleHandle, Variable};
pub use workspace::Workspace;
