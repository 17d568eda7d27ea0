//! Variables
//!
//! A [`Variable`] is a named, typed subgraph of the host workflow whose value
//! flows out of one designated output port.
//!
//! # Lifecycle
//!
//! 1. **Building** - modules, functions and connections are buffered in a
//!    [`PipelineGenerator`]; the store is not touched.
//! 2. **Materialized** - [`Variable::materialize`] commits the buffer as a
//!    child of the variables root, wires the output into the root's
//!    OutputPort and tags the version `dat-var-<name>`. The variable is then
//!    immutable; derived variables copy its subgraph with
//!    [`Variable::from_workflow`].
//! 3. **Removed** - [`Variable::remove`] prunes the version.

use crate::error::{DatError, Result};
use crate::host::{Controller, GraphEdit, ModuleId, Pipeline, PortRef, VersionId, VersionStore};
use crate::pipeline::PipelineGenerator;
use crate::provenance::Provenance;
use crate::types::{ConstantValue, TypeDescriptor};

/// Version annotations recording what `from_committed` cannot recover from
/// the graph alone.
const TYPE_ANNOTATION: &str = "dat.type";
const PROVENANCE_ANNOTATION: &str = "dat.provenance";

/// Handle on a module added to a variable under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(ModuleId);

impl ModuleHandle {
    pub fn id(self) -> ModuleId {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    ty: TypeDescriptor,
    generator: PipelineGenerator,
    output: Option<PortRef>,
    provenance: Option<Provenance>,
    version: Option<VersionId>,
}

impl Variable {
    /// Start building a variable of the given type.
    pub fn new(ty: TypeDescriptor) -> Self {
        Self {
            ty,
            generator: PipelineGenerator::new(),
            output: None,
            provenance: None,
            version: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn output(&self) -> Option<&PortRef> {
        self.output.as_ref()
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = Some(provenance);
    }

    /// Committed version, once materialized.
    pub fn version(&self) -> Option<VersionId> {
        self.version
    }

    pub fn is_materialized(&self) -> bool {
        self.version.is_some()
    }

    /// Edits buffered so far.
    pub fn generator(&self) -> &PipelineGenerator {
        &self.generator
    }

    pub(crate) fn generator_mut(&mut self) -> &mut PipelineGenerator {
        &mut self.generator
    }

    pub(crate) fn set_output(&mut self, output: PortRef) {
        self.output = Some(output);
    }

    // ==================== Building ====================

    pub fn add_module(&mut self, controller: &mut Controller<'_>, descriptor: &TypeDescriptor) -> ModuleHandle {
        let module = controller.create_module(descriptor);
        ModuleHandle(self.generator.add_module(module))
    }

    /// Add a module by package and type name.
    pub fn add_module_named(
        &mut self,
        controller: &mut Controller<'_>,
        package: &str,
        name: &str,
    ) -> Result<ModuleHandle> {
        let descriptor = controller.resolve_type(package, name)?;
        Ok(self.add_module(controller, &descriptor))
    }

    /// Set a function (input port value) on one of this variable's modules.
    pub fn add_function(&mut self, module: ModuleHandle, port: &str, values: Vec<String>) -> Result<()> {
        self.generator.update_function(module.id(), port, values)
    }

    /// Connect `from.out_port` to `to.in_port`; both modules must belong to
    /// this variable.
    pub fn connect(
        &mut self,
        controller: &mut Controller<'_>,
        from: ModuleHandle,
        out_port: &str,
        to: ModuleHandle,
        in_port: &str,
    ) -> Result<()> {
        self.generator
            .connect(controller, PortRef::new(from.id(), out_port), PortRef::new(to.id(), in_port))?;
        Ok(())
    }

    /// Connect an absorbed output (see [`Variable::absorb`]) to an input port.
    pub fn connect_output(
        &mut self,
        controller: &mut Controller<'_>,
        source: &PortRef,
        to: ModuleHandle,
        in_port: &str,
    ) -> Result<()> {
        self.generator
            .connect(controller, source.clone(), PortRef::new(to.id(), in_port))?;
        Ok(())
    }

    /// Designate the port the variable's value flows out of. Allowed once.
    pub fn select_output_port(&mut self, module: ModuleHandle, port: &str) -> Result<()> {
        if self.output.is_some() {
            return Err(DatError::OutputAlreadyDesignated);
        }
        if !self.generator.contains_module(module.id()) {
            return Err(DatError::ForeignModule(module.id()));
        }
        self.output = Some(PortRef::new(module.id(), port));
        Ok(())
    }

    /// Take over the buffered subgraph of an unmaterialized variable.
    ///
    /// # Returns
    /// The absorbed variable's output port, now owned by `self`
    pub fn absorb(&mut self, other: Variable) -> Result<PortRef> {
        if other.is_materialized() {
            return Err(DatError::Host(
                "cannot absorb a materialized variable; copy it with Variable::from_workflow".into(),
            ));
        }
        let output = other.output.ok_or(DatError::OutputNotDesignated)?;
        self.generator.append(other.generator);
        Ok(output)
    }

    // ==================== Construction helpers ====================

    /// A single module of type `ty` whose `value` function holds `value`.
    pub fn constant(controller: &mut Controller<'_>, value: &ConstantValue, ty: &TypeDescriptor) -> Result<Self> {
        let port = controller.config().ports.value.clone();
        let mut variable = Variable::new(ty.clone());
        let module = variable.add_module(controller, ty);
        variable.add_function(module, &port, vec![value.to_string()])?;
        variable.select_output_port(module, &port)?;
        variable.provenance = Some(Provenance::Constant {
            value: value.clone(),
        });
        Ok(variable)
    }

    /// Copy a materialized variable's subgraph into a new unmaterialized one.
    ///
    /// Every module and connection gets a fresh id; the connection into the
    /// variables root is dropped and its source becomes the output. Type and
    /// provenance carry over.
    pub fn from_workflow(controller: &mut Controller<'_>, source: &Variable) -> Result<Self> {
        let version = source
            .version
            .ok_or_else(|| DatError::NotMaterialized(source.ty.to_string()))?;
        let root = controller.variables_root()?;
        let pipeline = controller.store().pipeline(version)?;
        let feed = output_feed(&pipeline, root.output_module)?;

        let mut variable = Variable::new(source.ty.clone());
        let mapping = variable
            .generator
            .copy_modules(controller, &pipeline, |m| m.id != root.output_module);
        for connection in pipeline.connections.values() {
            if connection.destination.module != root.output_module {
                variable
                    .generator
                    .copy_connection(controller, connection, &mapping)?;
            }
        }

        let output_module = mapping.get(&feed.module).copied().ok_or_else(|| {
            DatError::Host(format!("output module {} was not copied", feed.module))
        })?;
        variable.output = Some(PortRef::new(output_module, feed.port));
        variable.provenance = source.provenance.clone();
        Ok(variable)
    }

    /// Rebuild a handle on a variable already committed at `version`.
    ///
    /// Type and provenance come from the version's annotations; without a
    /// type annotation the output module's type is used.
    pub fn from_committed(controller: &mut Controller<'_>, version: VersionId) -> Result<Self> {
        let root = controller.variables_root()?;
        let store = controller.store();
        let pipeline = store.pipeline(version)?;
        let feed = output_feed(&pipeline, root.output_module)?;

        let ty = match store.annotation(version, TYPE_ANNOTATION) {
            Some(ty) => ty.parse::<TypeDescriptor>()?,
            None => pipeline
                .module(feed.module)
                .map(|m| m.descriptor.clone())
                .ok_or_else(|| DatError::Host(format!("missing output module {}", feed.module)))?,
        };
        let provenance = store
            .annotation(version, PROVENANCE_ANNOTATION)
            .and_then(|json| match serde_json::from_str(&json) {
                Ok(provenance) => Some(provenance),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable provenance of {}: {}", version, e);
                    None
                }
            });

        Ok(Self {
            ty,
            generator: PipelineGenerator::new(),
            output: Some(feed),
            provenance,
            version: Some(version),
        })
    }

    // ==================== Lifecycle ====================

    /// Commit the variable as a child of the variables root tagged
    /// `dat-var-<name>`.
    ///
    /// The buffer and the output connection go in one commit. On error the
    /// variable keeps its buffer and no tag is left behind.
    pub fn materialize(&mut self, controller: &mut Controller<'_>, name: &str) -> Result<VersionId> {
        if self.is_materialized() {
            return Err(DatError::Host(format!("variable {:?} is already materialized", name)));
        }
        let output = self.output.clone().ok_or(DatError::OutputNotDesignated)?;

        let root = controller.variables_root()?;
        controller.store_mut().select_version(root.version)?;

        let pipe = PortRef::new(root.output_module, controller.config().ports.internal_pipe.clone());
        let connection = controller.create_connection(output, pipe);
        let mut edits = self.generator.edits().to_vec();
        edits.push(GraphEdit::AddConnection(connection));

        let version = controller.store_mut().commit(edits)?;
        let tag = controller.config().variable_tag(name);
        if let Err(e) = self.record(controller.store_mut(), version, &tag) {
            controller.store_mut().prune(version)?;
            return Err(e);
        }

        tracing::info!("Materialized variable {:?} as {}", name, version);
        self.version = Some(version);
        self.generator = PipelineGenerator::new();
        Ok(version)
    }

    fn record(&self, store: &mut dyn VersionStore, version: VersionId, tag: &str) -> Result<()> {
        store.tag_version(version, tag)?;
        store.set_annotation(version, TYPE_ANNOTATION, &self.ty.to_string())?;
        if let Some(provenance) = &self.provenance {
            store.set_annotation(version, PROVENANCE_ANNOTATION, &serde_json::to_string(provenance)?)?;
        }
        Ok(())
    }

    /// Prune the variable's version.
    pub fn remove(&self, controller: &mut Controller<'_>) -> Result<()> {
        let version = self
            .version
            .ok_or_else(|| DatError::NotMaterialized(self.ty.to_string()))?;
        controller.store_mut().prune(version)
    }

    /// Re-tag the variable's version as `dat-var-<new_name>`.
    pub fn rename(&self, controller: &mut Controller<'_>, new_name: &str) -> Result<()> {
        let version = self
            .version
            .ok_or_else(|| DatError::NotMaterialized(new_name.to_string()))?;
        let tag = controller.config().variable_tag(new_name);
        controller.store_mut().tag_version(version, &tag)
    }

    /// The committed subgraph (including the variables root module).
    pub fn pipeline(&self, controller: &Controller<'_>) -> Result<Pipeline> {
        let version = self
            .version
            .ok_or_else(|| DatError::NotMaterialized(self.ty.to_string()))?;
        controller.store().pipeline(version)
    }
}

/// Source port of the single connection into the variables root module.
fn output_feed(pipeline: &Pipeline, output_module: ModuleId) -> Result<PortRef> {
    let mut feeds = pipeline.connections_into(output_module);
    match (feeds.next(), feeds.next()) {
        (Some(connection), None) => Ok(connection.source.clone()),
        (None, _) => Err(DatError::OutputNotDesignated),
        (Some(_), Some(_)) => Err(DatError::Host(format!(
            "variables root module {} has more than one input",
            output_module
        ))),
    }
}
