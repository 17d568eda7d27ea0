//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use dat_rs::config::DatConfig;
use dat_rs::host::{MemoryVistrail, ModuleRegistry, Pipeline};
use dat_rs::operations::{OperationProvider, OperationRegistry};
use dat_rs::{TypeDescriptor, Workspace};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Package of the module types the tests register on top of the basic ones.
pub const TEST_PACKAGE: &str = "org.example.plots";

pub fn test_type(name: &str) -> TypeDescriptor {
    TypeDescriptor::new(TEST_PACKAGE, name)
}

/// Basic modules plus a small test package:
/// `Plotter`, `Label`, `Mix`, and `Sample <: Float`.
pub fn module_registry(config: &DatConfig) -> ModuleRegistry {
    let mut registry = ModuleRegistry::with_basic_package(config);
    for name in ["Plotter", "Label", "Mix"] {
        registry.add_module(test_type(name), &[]).unwrap();
    }
    registry
        .add_module(test_type("Sample"), &[config.basic("Float")])
        .unwrap();
    registry
}

/// Workspace on an empty in-memory store with only the built-in operations.
pub fn workspace() -> Workspace {
    workspace_with(&[])
}

/// Workspace whose operations come from `providers` (in order) and the
/// built-ins.
pub fn workspace_with(providers: &[&dyn OperationProvider]) -> Workspace {
    let config = DatConfig::default();
    let mut operations = OperationRegistry::with_builtins(&config);
    for provider in providers {
        operations.install_provider(*provider);
    }
    Workspace::new(
        Box::new(MemoryVistrail::new()),
        Arc::new(module_registry(&config)),
        operations.snapshot(),
        config,
    )
}

/// Id-independent description of a pipeline.
///
/// Each module is described by its type, its functions and, recursively,
/// what feeds its input ports. Two pipelines are isomorphic (for the tree
/// shaped graphs DAT builds) iff their canonical forms are equal.
pub fn canonical(pipeline: &Pipeline) -> Vec<String> {
    let mut forms: Vec<String> = pipeline
        .modules
        .keys()
        .map(|id| describe(pipeline, *id, 0))
        .collect();
    forms.sort();
    forms
}

fn describe(pipeline: &Pipeline, id: dat_rs::host::ModuleId, depth: usize) -> String {
    let Some(module) = pipeline.module(id) else {
        return "?".to_string();
    };
    let mut functions: Vec<String> = module
        .functions
        .iter()
        .map(|f| format!("{}={}", f.name, f.params.join(",")))
        .collect();
    functions.sort();

    let mut inputs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if depth < 16 {
        for connection in pipeline.connections_into(id) {
            inputs
                .entry(connection.destination.port.clone())
                .or_default()
                .push(format!(
                    "{}.{}",
                    describe(pipeline, connection.source.module, depth + 1),
                    connection.source.port
                ));
        }
    }
    for sources in inputs.values_mut() {
        sources.sort();
    }

    format!(
        "{}[{}]({:?})",
        module.descriptor,
        functions.join(";"),
        inputs
    )
}

/// Modules of `pipeline` whose type is named `name` (any package).
pub fn modules_named<'a>(pipeline: &'a Pipeline, name: &str) -> Vec<&'a dat_rs::host::Module> {
    pipeline
        .modules
        .values()
        .filter(|m| m.descriptor.name == name)
        .collect()
}
