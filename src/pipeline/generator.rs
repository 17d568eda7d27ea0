//! Buffered graph edits.
//!
//! A [`PipelineGenerator`] collects module, function and connection edits
//! without touching the version store. Nothing becomes visible until
//! [`PipelineGenerator::commit`] hands the whole buffer to the store as one
//! version.

use crate::error::{DatError, Result};
use crate::host::{
    Connection, ConnectionId, Controller, GraphEdit, Module, ModuleId, Pipeline, PortRef,
    VersionId, VersionStore,
};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineGenerator {
    edits: Vec<GraphEdit>,
    modules: BTreeSet<ModuleId>,
}

impl PipelineGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let id = module.id;
        self.modules.insert(id);
        self.edits.push(GraphEdit::AddModule(module));
        id
    }

    /// Set a function on a module added to this buffer.
    pub fn update_function(&mut self, module: ModuleId, name: &str, params: Vec<String>) -> Result<()> {
        if !self.modules.contains(&module) {
            return Err(DatError::ForeignModule(module));
        }
        self.edits.push(GraphEdit::SetFunction {
            module,
            name: name.to_string(),
            params,
        });
        Ok(())
    }

    /// Mint and buffer a connection between two ports of buffered modules.
    pub fn connect(
        &mut self,
        controller: &mut Controller<'_>,
        source: PortRef,
        destination: PortRef,
    ) -> Result<ConnectionId> {
        for end in [&source, &destination] {
            if !self.modules.contains(&end.module) {
                return Err(DatError::ForeignModule(end.module));
            }
        }
        let connection = controller.create_connection(source, destination);
        let id = connection.id;
        self.edits.push(GraphEdit::AddConnection(connection));
        Ok(id)
    }

    pub fn contains_module(&self, module: ModuleId) -> bool {
        self.modules.contains(&module)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn edits(&self) -> &[GraphEdit] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Move every edit of `other` to the end of this buffer.
    pub fn append(&mut self, other: PipelineGenerator) {
        self.modules.extend(other.modules);
        self.edits.extend(other.edits);
    }

    /// Copy the modules of `pipeline` accepted by `keep`, with fresh ids and
    /// their functions.
    ///
    /// # Returns
    /// Mapping from the ids in `pipeline` to the ids of the copies
    pub fn copy_modules<F>(
        &mut self,
        controller: &mut Controller<'_>,
        pipeline: &Pipeline,
        mut keep: F,
    ) -> BTreeMap<ModuleId, ModuleId>
    where
        F: FnMut(&Module) -> bool,
    {
        let mut mapping = BTreeMap::new();
        for module in pipeline.modules.values().filter(|m| keep(*m)) {
            let copy = controller.create_module(&module.descriptor);
            let id = self.add_module(copy);
            for function in &module.functions {
                self.edits.push(GraphEdit::SetFunction {
                    module: id,
                    name: function.name.clone(),
                    params: function.params.clone(),
                });
            }
            mapping.insert(module.id, id);
        }
        mapping
    }

    /// Copy a connection whose both ends were copied with `mapping`.
    pub fn copy_connection(
        &mut self,
        controller: &mut Controller<'_>,
        connection: &Connection,
        mapping: &BTreeMap<ModuleId, ModuleId>,
    ) -> Result<ConnectionId> {
        let remap = |end: &PortRef| {
            mapping
                .get(&end.module)
                .map(|&module| PortRef::new(module, end.port.clone()))
                .ok_or_else(|| {
                    DatError::Host(format!(
                        "connection {:?} references module {} which was not copied",
                        connection.id, end.module
                    ))
                })
        };
        let source = remap(&connection.source)?;
        let destination = remap(&connection.destination)?;
        self.connect(controller, source, destination)
    }

    /// Commit the buffer on top of the store's current version.
    pub fn commit(self, store: &mut dyn VersionStore) -> Result<VersionId> {
        store.commit(self.edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatConfig;
    use crate::host::{MemoryVistrail, ModuleRegistry};

    #[test]
    fn test_buffer_is_invisible_until_commit() {
        let config = DatConfig::default();
        let registry = ModuleRegistry::with_basic_package(&config);
        let mut store = MemoryVistrail::new();
        let mut generator = PipelineGenerator::new();

        {
            let mut controller = Controller::new(&mut store, &registry, &config);
            let float = config.basic("Float");
            let a = generator.add_module(controller.create_module(&float));
            let b = generator.add_module(controller.create_module(&float));
            generator.update_function(a, "value", vec!["1".into()]).unwrap();
            generator
                .connect(&mut controller, PortRef::new(a, "value"), PortRef::new(b, "value"))
                .unwrap();
        }

        assert_eq!(store.version_count(), 1);
        let version = generator.commit(&mut store).unwrap();
        let pipeline = store.pipeline(version).unwrap();
        assert_eq!(pipeline.modules.len(), 2);
        assert_eq!(pipeline.connections.len(), 1);
    }

    #[test]
    fn test_rejects_foreign_modules() {
        let config = DatConfig::default();
        let registry = ModuleRegistry::with_basic_package(&config);
        let mut store = MemoryVistrail::new();
        let mut controller = Controller::new(&mut store, &registry, &config);
        let mut generator = PipelineGenerator::new();

        let own = generator.add_module(controller.create_module(&config.basic("Float")));
        let stranger = ModuleId(999);

        assert!(matches!(
            generator.update_function(stranger, "value", vec![]),
            Err(DatError::ForeignModule(id)) if id == stranger
        ));
        assert!(matches!(
            generator.connect(
                &mut controller,
                PortRef::new(own, "value"),
                PortRef::new(stranger, "value")
            ),
            Err(DatError::ForeignModule(_))
        ));
    }

    #[test]
    fn test_copy_modules_mints_fresh_ids() {
        let config = DatConfig::default();
        let registry = ModuleRegistry::with_basic_package(&config);
        let mut store = MemoryVistrail::new();
        let mut controller = Controller::new(&mut store, &registry, &config);

        let mut template = Pipeline::new();
        let mut source = Module::new(ModuleId(1), config.basic("Float"));
        source.set_function("value", vec!["4".into()]);
        template.apply(GraphEdit::AddModule(source)).unwrap();
        template
            .apply(GraphEdit::AddModule(Module::new(ModuleId(2), config.basic("String"))))
            .unwrap();

        let mut generator = PipelineGenerator::new();
        let first = generator.copy_modules(&mut controller, &template, |_| true);
        let second = generator.copy_modules(&mut controller, &template, |m| m.id == ModuleId(1));

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_ne!(first[&ModuleId(1)], second[&ModuleId(1)]);
        assert_eq!(generator.module_count(), 3);
        // one module copy per module plus one function edit per copied function
        assert_eq!(generator.edits().len(), 5);
    }
}
