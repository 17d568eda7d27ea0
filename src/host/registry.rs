//! In-memory module type registry
//!
//! [`ModuleRegistry`] stores module types with their direct parents. The
//! basic package is preloaded by [`ModuleRegistry::with_basic_package`]:
//!
//! ```text
//! Module
//! +-- Constant
//! |   +-- String
//! |   +-- Float
//! |   |   +-- Integer
//! |   +-- Boolean
//! |   +-- List
//! +-- InputPort
//! +-- OutputPort
//! +-- ConcatenateString
//! +-- PythonCalc            (pythoncalc package)
//! ```

use crate::config::DatConfig;
use crate::error::{DatError, Result};
use crate::host::TypeRegistry;
use crate::types::TypeDescriptor;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    root: TypeDescriptor,
    parents: HashMap<TypeDescriptor, Vec<TypeDescriptor>>,
}

impl ModuleRegistry {
    /// Create a registry containing only the root type.
    pub fn new(root: TypeDescriptor) -> Self {
        let mut parents = HashMap::new();
        parents.insert(root.clone(), Vec::new());
        Self { root, parents }
    }

    /// Create a registry with the host's basic modules.
    pub fn with_basic_package(config: &DatConfig) -> Self {
        let basic = |name: &str| config.basic(name);
        let mut registry = Self::new(basic("Module"));

        let entries: [(&str, &str); 9] = [
            ("Constant", "Module"),
            ("String", "Constant"),
            ("Float", "Constant"),
            ("Integer", "Float"),
            ("Boolean", "Constant"),
            ("List", "Constant"),
            ("InputPort", "Module"),
            ("OutputPort", "Module"),
            ("ConcatenateString", "Module"),
        ];
        for (name, parent) in entries {
            registry.insert(basic(name), vec![basic(parent)]);
        }
        registry.insert(
            TypeDescriptor::new(&config.packages.pythoncalc, "PythonCalc"),
            vec![basic("Module")],
        );

        registry
    }

    /// Register a module type. Every parent must already be registered.
    pub fn add_module(
        &mut self,
        descriptor: TypeDescriptor,
        parents: &[TypeDescriptor],
    ) -> Result<()> {
        if self.parents.contains_key(&descriptor) {
            return Err(DatError::Registry(format!(
                "module type {} is already registered",
                descriptor
            )));
        }
        if let Some(missing) = parents.iter().find(|p| !self.parents.contains_key(*p)) {
            return Err(DatError::UnknownType(missing.to_string()));
        }
        let parents = if parents.is_empty() {
            vec![self.root.clone()]
        } else {
            parents.to_vec()
        };
        self.insert(descriptor, parents);
        Ok(())
    }

    pub fn contains(&self, descriptor: &TypeDescriptor) -> bool {
        self.parents.contains_key(descriptor)
    }

    fn insert(&mut self, descriptor: TypeDescriptor, parents: Vec<TypeDescriptor>) {
        self.parents.insert(descriptor, parents);
    }
}

impl TypeRegistry for ModuleRegistry {
    fn resolve_type(&self, package: &str, name: &str) -> Option<TypeDescriptor> {
        let descriptor = TypeDescriptor::new(package, name);
        self.parents.contains_key(&descriptor).then_some(descriptor)
    }

    fn parents(&self, descriptor: &TypeDescriptor) -> Vec<TypeDescriptor> {
        self.parents.get(descriptor).cloned().unwrap_or_default()
    }

    fn root_type(&self) -> TypeDescriptor {
        self.root.clone()
    }
}
