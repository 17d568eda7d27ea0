//! Plots and recipes.
//!
//! A [`Plot`] is a pipeline template with named parameter sockets: each
//! InputPort module, identified by its `name` function, stands for one plot
//! port. A [`Recipe`] binds variables to those ports.
//!
//! Plot descriptors are JSON files:
//!
//! ```json
//! {
//!   "name": "Histogram",
//!   "description": "Distribution of one numeric variable",
//!   "subworkflow": "{package_dir}/histogram.json",
//!   "ports": [{"name": "data", "type": "org.vistrails.vistrails.basic:Float"}]
//! }
//! ```

use crate::error::{DatError, Result};
use crate::host::Pipeline;
use crate::types::TypeDescriptor;
use crate::variable::Variable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Replace `{package_dir}` in a template path.
pub fn expand_package_dir(template: &str, package_dir: &Path) -> PathBuf {
    PathBuf::from(template.replace("{package_dir}", &package_dir.to_string_lossy()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotPort {
    pub name: String,
    #[serde(rename = "type", with = "descriptor_string")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub optional: bool,
}

impl PlotPort {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub name: String,
    pub description: Option<String>,
    pub subworkflow: Pipeline,
    pub ports: Vec<PlotPort>,
}

#[derive(Deserialize)]
struct PlotFile {
    name: String,
    #[serde(default)]
    description: Option<String>,
    subworkflow: String,
    #[serde(default)]
    ports: Vec<PlotPort>,
}

impl Plot {
    pub fn new(name: impl Into<String>, subworkflow: Pipeline, ports: Vec<PlotPort>) -> Self {
        Self {
            name: name.into(),
            description: None,
            subworkflow,
            ports,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Load a plot descriptor; `{package_dir}` in its subworkflow path is
    /// replaced by `package_dir`.
    pub fn load(path: impl AsRef<Path>, package_dir: &Path) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: PlotFile = serde_json::from_str(&content).map_err(|e| {
            DatError::Serialization(format!("Failed to parse plot {:?}: {}", path, e))
        })?;
        let subworkflow = Pipeline::load(expand_package_dir(&file.subworkflow, package_dir))?;

        tracing::debug!("Loaded plot {:?} with {} ports", file.name, file.ports.len());
        Ok(Self {
            name: file.name,
            description: file.description,
            subworkflow,
            ports: file.ports,
        })
    }

    pub fn port(&self, name: &str) -> Option<&PlotPort> {
        self.ports.iter().find(|p| p.name == name)
    }
}

/// A plot together with the variables bound to its ports.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub plot: Arc<Plot>,
    pub variables: BTreeMap<String, Arc<Variable>>,
}

impl Recipe {
    pub fn new(plot: Arc<Plot>) -> Self {
        Self {
            plot,
            variables: BTreeMap::new(),
        }
    }

    pub fn bind(mut self, port: impl Into<String>, variable: Arc<Variable>) -> Self {
        self.variables.insert(port.into(), variable);
        self
    }

    /// Check that every bound name is a port of the plot and every required
    /// port is bound.
    pub fn validate(&self) -> Result<()> {
        if let Some(unknown) = self.variables.keys().find(|name| self.plot.port(name).is_none()) {
            return Err(DatError::Recipe(format!(
                "plot {:?} has no port {:?}",
                self.plot.name, unknown
            )));
        }
        if let Some(missing) = self
            .plot
            .ports
            .iter()
            .find(|port| !port.optional && !self.variables.contains_key(&port.name))
        {
            return Err(DatError::Recipe(format!(
                "plot {:?} requires port {:?}",
                self.plot.name, missing.name
            )));
        }
        Ok(())
    }
}

/// `package:Name` strings for descriptors in plot files.
mod descriptor_string {
    use crate::types::TypeDescriptor;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(descriptor: &TypeDescriptor, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(descriptor)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TypeDescriptor, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
