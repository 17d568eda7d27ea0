//! Pipeline graph data model.
//!
//! A [`Pipeline`] is the materialized graph at one version: modules keyed by
//! id and connections between their ports. Changes are expressed as ordered
//! [`GraphEdit`]s and only take effect when the store commits them.

use crate::error::{DatError, Result};
use crate::host::id::{ConnectionId, ModuleId};
use crate::types::TypeDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A function (parameter binding) set on an input port of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFunction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
}

/// A module instance in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub descriptor: TypeDescriptor,
    #[serde(default)]
    pub functions: Vec<ModuleFunction>,
}

impl Module {
    pub fn new(id: ModuleId, descriptor: TypeDescriptor) -> Self {
        Self {
            id,
            descriptor,
            functions: Vec::new(),
        }
    }

    /// First parameter of the named function, if set.
    pub fn function(&self, name: &str) -> Option<&str> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.params.first())
            .map(String::as_str)
    }

    /// Replace (or add) the named function.
    pub fn set_function(&mut self, name: &str, params: Vec<String>) {
        match self.functions.iter_mut().find(|f| f.name == name) {
            Some(function) => function.params = params,
            None => self.functions.push(ModuleFunction {
                name: name.to_string(),
                params,
            }),
        }
    }
}

/// One end of a connection: a module and one of its port names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub module: ModuleId,
    pub port: String,
}

impl PortRef {
    pub fn new(module: ModuleId, port: impl Into<String>) -> Self {
        Self {
            module,
            port: port.into(),
        }
    }
}

/// A connection from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: PortRef,
    pub destination: PortRef,
}

/// A buffered change to a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphEdit {
    AddModule(Module),
    SetFunction {
        module: ModuleId,
        name: String,
        params: Vec<String>,
    },
    AddConnection(Connection),
}

/// A complete pipeline graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "PipelineFile", try_from = "PipelineFile")]
pub struct Pipeline {
    pub modules: BTreeMap<ModuleId, Module>,
    pub connections: BTreeMap<ConnectionId, Connection>,
}

/// On-disk layout of a pipeline template.
#[derive(Serialize, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    modules: Vec<Module>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl From<Pipeline> for PipelineFile {
    fn from(pipeline: Pipeline) -> Self {
        Self {
            modules: pipeline.modules.into_values().collect(),
            connections: pipeline.connections.into_values().collect(),
        }
    }
}

impl TryFrom<PipelineFile> for Pipeline {
    type Error = DatError;

    fn try_from(file: PipelineFile) -> Result<Self> {
        let mut pipeline = Pipeline::default();
        for module in file.modules {
            pipeline.apply(GraphEdit::AddModule(module))?;
        }
        for connection in file.connections {
            pipeline.apply(GraphEdit::AddConnection(connection))?;
        }
        Ok(pipeline)
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a pipeline template from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            DatError::Serialization(format!("Failed to parse pipeline {:?}: {}", path, e))
        })
    }

    /// Save the pipeline as a JSON template
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Modules of the given type, in id order.
    pub fn modules_of_type<'a>(
        &'a self,
        descriptor: &'a TypeDescriptor,
    ) -> impl Iterator<Item = &'a Module> + 'a {
        self.modules
            .values()
            .filter(move |m| &m.descriptor == descriptor)
    }

    /// Connections whose destination is the given module.
    pub fn connections_into(&self, module: ModuleId) -> impl Iterator<Item = &Connection> + '_ {
        self.connections
            .values()
            .filter(move |c| c.destination.module == module)
    }

    /// Apply a single edit, validating it against the current graph.
    pub fn apply(&mut self, edit: GraphEdit) -> Result<()> {
        match edit {
            GraphEdit::AddModule(module) => {
                if self.modules.contains_key(&module.id) {
                    return Err(DatError::Host(format!(
                        "module {} already exists in pipeline",
                        module.id
                    )));
                }
                self.modules.insert(module.id, module);
            }
            GraphEdit::SetFunction {
                module,
                name,
                params,
            } => {
                let target = self.modules.get_mut(&module).ok_or_else(|| {
                    DatError::Host(format!("cannot set function on missing module {}", module))
                })?;
                target.set_function(&name, params);
            }
            GraphEdit::AddConnection(connection) => {
                if self.connections.contains_key(&connection.id) {
                    return Err(DatError::Host(format!(
                        "connection {:?} already exists in pipeline",
                        connection.id
                    )));
                }
                for end in [&connection.source, &connection.destination] {
                    if !self.modules.contains_key(&end.module) {
                        return Err(DatError::Host(format!(
                            "connection {:?} references missing module {}",
                            connection.id, end.module
                        )));
                    }
                }
                self.connections.insert(connection.id, connection);
            }
        }
        Ok(())
    }
}
