//! Recipe compilation.
//!
//! A plot template receives variables through its InputPort modules, each
//! named after the plot port it stands for. Compiling a recipe replaces every
//! InputPort with the copied subgraph of the variable bound to that port.

use super::generator::PipelineGenerator;
use super::recipe::Recipe;
use crate::error::{DatError, Result};
use crate::host::{Controller, ModuleId, Pipeline, PipelineInformation, PortRef, VersionId};
use std::collections::BTreeMap;

/// Compiles a recipe into a standalone pipeline version
pub struct RecipeCompiler;

impl RecipeCompiler {
    /// Compile a recipe into a new version branching from the root version.
    ///
    /// The plot template is copied without its InputPort modules; each
    /// InputPort connection becomes a socket for the port it names. Each
    /// bound variable's committed subgraph is copied without the variables
    /// root OutputPort, and the connection that fed that OutputPort is
    /// redirected to every socket of the variable's port. All ids are fresh,
    /// so the same variable can appear in many pipelines.
    ///
    /// # Arguments
    /// * `controller` - Host access for the current critical section
    /// * `recipe` - Plot and variable bindings
    ///
    /// # Returns
    /// The committed version, ready to hand to the execution engine
    pub fn compile(controller: &mut Controller<'_>, recipe: &Recipe) -> Result<PipelineInformation> {
        recipe.validate()?;
        let mut generator = PipelineGenerator::new();

        let sockets = Self::copy_plot(controller, &mut generator, &recipe.plot.subworkflow)?;

        if !recipe.variables.is_empty() {
            let root = controller.variables_root()?;
            for (port, variable) in &recipe.variables {
                let version = variable
                    .version()
                    .ok_or_else(|| DatError::NotMaterialized(port.clone()))?;
                let pipeline = controller.store().pipeline(version)?;
                let targets = sockets.get(port).map(Vec::as_slice).unwrap_or_default();
                if targets.is_empty() {
                    tracing::warn!(
                        "Plot {:?} has no InputPort for {:?}; variable left unconnected",
                        recipe.plot.name,
                        port
                    );
                }
                Self::splice_variable(controller, &mut generator, &pipeline, root.output_module, targets)?;
            }
        }

        // Recipe pipelines are independent of the variables tree
        controller.store_mut().select_version(VersionId::ROOT)?;
        let version = generator.commit(controller.store_mut())?;
        tracing::info!(
            "Created pipeline {} for plot {:?} with {} variables",
            version,
            recipe.plot.name,
            recipe.variables.len()
        );
        Ok(PipelineInformation::new(version))
    }

    /// Copy the plot template minus its InputPort modules.
    ///
    /// # Returns
    /// For each parameter name, the input ports its InputPort fed
    fn copy_plot(
        controller: &mut Controller<'_>,
        generator: &mut PipelineGenerator,
        plot: &Pipeline,
    ) -> Result<BTreeMap<String, Vec<PortRef>>> {
        let input_type = controller.basic_type("InputPort")?;
        let mapping = generator.copy_modules(controller, plot, |m| m.descriptor != input_type);

        let mut sockets: BTreeMap<String, Vec<PortRef>> = BTreeMap::new();
        for connection in plot.connections.values() {
            let source = plot.module(connection.source.module).ok_or_else(|| {
                DatError::Recipe(format!("plot references missing module {}", connection.source.module))
            })?;
            if source.descriptor != input_type {
                generator.copy_connection(controller, connection, &mapping)?;
                continue;
            }

            let name = source
                .function("name")
                .ok_or_else(|| DatError::Recipe(format!("plot InputPort {} has no name", source.id)))?;
            let destination = mapping.get(&connection.destination.module).ok_or_else(|| {
                DatError::Recipe(format!("plot InputPort {:?} feeds another InputPort", name))
            })?;
            sockets
                .entry(name.to_string())
                .or_default()
                .push(PortRef::new(*destination, connection.destination.port.clone()));
        }
        Ok(sockets)
    }

    /// Copy a committed variable subgraph and wire its output to `targets`.
    fn splice_variable(
        controller: &mut Controller<'_>,
        generator: &mut PipelineGenerator,
        variable: &Pipeline,
        output_module: ModuleId,
        targets: &[PortRef],
    ) -> Result<()> {
        let mapping = generator.copy_modules(controller, variable, |m| m.id != output_module);

        for connection in variable.connections.values() {
            if connection.destination.module != output_module {
                generator.copy_connection(controller, connection, &mapping)?;
                continue;
            }
            let source = mapping.get(&connection.source.module).ok_or_else(|| {
                DatError::Host(format!("variable output module {} was not copied", connection.source.module))
            })?;
            for target in targets {
                generator.connect(
                    controller,
                    PortRef::new(*source, connection.source.port.clone()),
                    target.clone(),
                )?;
            }
        }
        Ok(())
    }
}
