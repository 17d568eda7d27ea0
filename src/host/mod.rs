//! Host contracts
//!
//! DAT runs inside a host application that owns the versioned workflow graph,
//! the module type registry and the pipeline execution engine. This module
//! defines the narrow interfaces DAT consumes from it:
//!
//! - [`VersionStore`] - versioned graph store (select, create, commit, tag,
//!   annotate, prune)
//! - [`TypeRegistry`] - module type lookup and inheritance
//! - [`ExecutionSink`] - fire-and-forget pipeline execution
//!
//! [`Controller`] bundles a store, a registry and the configuration for the
//! duration of one critical section. In-memory implementations live in
//! [`memory`], [`registry`] and [`execution`].

pub mod execution;
pub mod graph;
pub mod id;
pub mod memory;
pub mod registry;

pub use execution::{CellInformation, ChannelExecutionSink, ExecutionRequest, ExecutionSink, PipelineInformation};
pub use graph::{Connection, GraphEdit, Module, ModuleFunction, Pipeline, PortRef};
pub use id::{ConnectionId, ModuleId, VersionId};
pub use memory::MemoryVistrail;
pub use registry::ModuleRegistry;

use crate::config::DatConfig;
use crate::error::{DatError, Result};
use crate::types::TypeDescriptor;
use std::collections::{HashSet, VecDeque};

/// Versioned graph store.
///
/// Every commit creates a child of the currently selected version and selects
/// it. Ids minted by `create_module`/`create_connection` are unique across the
/// whole store; minting does not change any version.
pub trait VersionStore: Send {
    fn current_version(&self) -> VersionId;

    fn select_version(&mut self, version: VersionId) -> Result<()>;

    /// Mint a new module. It only exists once an `AddModule` edit is committed.
    fn create_module(&mut self, descriptor: &TypeDescriptor) -> Module;

    /// Mint a new connection. It only exists once an `AddConnection` edit is committed.
    fn create_connection(&mut self, source: PortRef, destination: PortRef) -> Connection;

    /// Build the edit setting a function on a module.
    fn set_function(&self, module: ModuleId, name: &str, params: Vec<String>) -> GraphEdit {
        GraphEdit::SetFunction {
            module,
            name: name.to_string(),
            params,
        }
    }

    /// Apply all edits on top of the current version as one new version.
    ///
    /// Either every edit applies or the store is left unchanged.
    fn commit(&mut self, edits: Vec<GraphEdit>) -> Result<VersionId>;

    fn pipeline(&self, version: VersionId) -> Result<Pipeline>;

    /// Parent of a version; `None` for the root version.
    fn parent(&self, version: VersionId) -> Result<Option<VersionId>>;

    /// Give a version the tag `name`. A version carries at most one tag and a
    /// tag names at most one version.
    fn tag_version(&mut self, version: VersionId, name: &str) -> Result<()>;

    fn resolve_tag(&self, name: &str) -> Option<VersionId>;

    /// All tags, sorted by name.
    fn tags(&self) -> Vec<(String, VersionId)>;

    /// Hide a version (and drop its tag).
    fn prune(&mut self, version: VersionId) -> Result<()>;

    /// Attach a key/value note to a version, replacing any previous value.
    fn set_annotation(&mut self, version: VersionId, key: &str, value: &str) -> Result<()>;

    fn annotation(&self, version: VersionId, key: &str) -> Option<String>;
}

/// Module type registry.
pub trait TypeRegistry: Send + Sync {
    fn resolve_type(&self, package: &str, name: &str) -> Option<TypeDescriptor>;

    /// Direct parents of a type, in declaration order.
    fn parents(&self, descriptor: &TypeDescriptor) -> Vec<TypeDescriptor>;

    /// The type every module type ultimately inherits.
    fn root_type(&self) -> TypeDescriptor;

    /// Ancestors of a type (itself first), breadth-first up to the root type.
    fn ancestry(&self, descriptor: &TypeDescriptor) -> Vec<TypeDescriptor> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([descriptor.clone()]);
        let mut ancestry = Vec::new();

        while let Some(ty) = queue.pop_front() {
            if !seen.insert(ty.clone()) {
                continue;
            }
            if ty != self.root_type() {
                queue.extend(self.parents(&ty));
            }
            ancestry.push(ty);
        }

        ancestry
    }
}

/// The version all variables descend from and its single OutputPort module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariablesRoot {
    pub version: VersionId,
    pub output_module: ModuleId,
}

/// Access to the host for the duration of one critical section.
pub struct Controller<'a> {
    store: &'a mut dyn VersionStore,
    registry: &'a dyn TypeRegistry,
    config: &'a DatConfig,
}

impl<'a> Controller<'a> {
    pub fn new(
        store: &'a mut dyn VersionStore,
        registry: &'a dyn TypeRegistry,
        config: &'a DatConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &dyn VersionStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn VersionStore {
        &mut *self.store
    }

    pub fn registry(&self) -> &dyn TypeRegistry {
        self.registry
    }

    pub fn config(&self) -> &DatConfig {
        self.config
    }

    /// Look up a type, failing if the registry does not know it.
    pub fn resolve_type(&self, package: &str, name: &str) -> Result<TypeDescriptor> {
        self.registry
            .resolve_type(package, name)
            .ok_or_else(|| DatError::UnknownType(format!("{}:{}", package, name)))
    }

    /// Look up a type of the basic package.
    pub fn basic_type(&self, name: &str) -> Result<TypeDescriptor> {
        self.resolve_type(&self.config.packages.basic, name)
    }

    pub fn create_module(&mut self, descriptor: &TypeDescriptor) -> Module {
        self.store.create_module(descriptor)
    }

    pub fn create_connection(&mut self, source: PortRef, destination: PortRef) -> Connection {
        self.store.create_connection(source, destination)
    }

    /// Get the version tagged as the variables root, creating it if needed.
    ///
    /// The root version holds exactly one OutputPort module named after
    /// `ports.output_name`; each variable connects its output to it.
    pub fn variables_root(&mut self) -> Result<VariablesRoot> {
        let tag = self.config.tags.variables_root.clone();

        let version = match self.store.resolve_tag(&tag) {
            Some(version) => version,
            None => {
                let descriptor = self.basic_type("OutputPort")?;
                self.store.select_version(VersionId::ROOT)?;

                let module = self.store.create_module(&descriptor);
                let name_function = self.store.set_function(
                    module.id,
                    "name",
                    vec![self.config.ports.output_name.clone()],
                );
                let version = self
                    .store
                    .commit(vec![GraphEdit::AddModule(module), name_function])?;
                self.store.tag_version(version, &tag)?;
                tracing::info!("Created variables root {} tagged {:?}", version, tag);
                version
            }
        };

        let pipeline = self.store.pipeline(version)?;
        let mut ids = pipeline.modules.keys();
        match (ids.next(), ids.next()) {
            (Some(&output_module), None) => Ok(VariablesRoot {
                version,
                output_module,
            }),
            _ => Err(DatError::Host(format!(
                "version tagged {:?} must contain exactly one module, found {}",
                tag,
                pipeline.modules.len()
            ))),
        }
    }
}
