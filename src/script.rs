//! Line-oriented scripts driving a [`Workspace`].
//!
//! ```text
//! # comments and blank lines are ignored
//! a = 2 + 3
//! b = a * 10
//! rename b scaled
//! plot plots/histogram.plot.json data=scaled
//! del a
//! ```
//!
//! A plot is named either by a plot a provider registered or by a descriptor
//! path relative to the script's directory; the descriptor's own directory is
//! its `{package_dir}`. A failing line is reported and the script continues.

use crate::error::{DatError, Result};
use crate::host::{Pipeline, VersionId};
use crate::pipeline::{Plot, Recipe};
use crate::provenance::Provenance;
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `name = expression`, kept verbatim
    Assign(String),
    Plot {
        descriptor: PathBuf,
        bindings: Vec<(String, String)>,
    },
    Remove(String),
    Rename { from: String, to: String },
}

/// Parse one script line; `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<Result<Statement>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    // `plot = ...` assigns a variable named plot
    let (_, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    if rest.trim_start().starts_with('=') {
        return Some(Ok(Statement::Assign(line.to_string())));
    }

    let mut words = line.split_whitespace();
    let statement = match words.next() {
        Some("plot") => parse_plot(words),
        Some("del") => match (words.next(), words.next()) {
            (Some(name), None) => Ok(Statement::Remove(name.to_string())),
            _ => Err(DatError::ScriptUsage("del <variable>".into())),
        },
        Some("rename") => match (words.next(), words.next(), words.next()) {
            (Some(from), Some(to), None) => Ok(Statement::Rename {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(DatError::ScriptUsage("rename <old> <new>".into())),
        },
        _ => Ok(Statement::Assign(line.to_string())),
    };
    Some(statement)
}

fn parse_plot<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<Statement> {
    let descriptor = words
        .next()
        .ok_or_else(|| DatError::ScriptUsage("plot <descriptor.json> port=variable ...".into()))?;
    let bindings = words
        .map(|binding| {
            binding
                .split_once('=')
                .filter(|(port, variable)| !port.is_empty() && !variable.is_empty())
                .map(|(port, variable)| (port.to_string(), variable.to_string()))
                .ok_or_else(|| DatError::ScriptUsage(format!("expected port=variable, got {:?}", binding)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Statement::Plot {
        descriptor: PathBuf::from(descriptor),
        bindings,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub version: Option<VersionId>,
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub line: usize,
    pub plot: String,
    pub version: VersionId,
    pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineMessage {
    pub line: usize,
    pub message: String,
}

/// Outcome of a script run, printed as JSON by the `dat` binary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptReport {
    pub variables: Vec<VariableReport>,
    pub pipelines: Vec<PipelineReport>,
    pub warnings: Vec<LineMessage>,
    pub errors: Vec<LineMessage>,
}

impl ScriptReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ScriptRunner<'w> {
    workspace: &'w Workspace,
    base_dir: PathBuf,
}

impl<'w> ScriptRunner<'w> {
    pub fn new(workspace: &'w Workspace, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace,
            base_dir: base_dir.into(),
        }
    }

    /// Run every line, collecting per-line errors.
    pub fn run(&self, script: &str) -> Result<ScriptReport> {
        let mut report = ScriptReport::default();

        for (index, line) in script.lines().enumerate() {
            let number = index + 1;
            let Some(statement) = parse_line(line) else {
                continue;
            };
            if let Err(e) = statement.and_then(|s| self.run_statement(number, s, &mut report)) {
                tracing::warn!("Line {}: {}", number, e);
                report.errors.push(LineMessage {
                    line: number,
                    message: e.to_string(),
                });
            }
        }

        for name in self.workspace.variable_names()? {
            if let Some(variable) = self.workspace.get_variable(&name)? {
                report.variables.push(VariableReport {
                    name,
                    ty: variable.ty().to_string(),
                    version: variable.version(),
                    provenance: variable.provenance().cloned(),
                });
            }
        }
        Ok(report)
    }

    fn run_statement(&self, line: usize, statement: Statement, report: &mut ScriptReport) -> Result<()> {
        match statement {
            Statement::Assign(text) => {
                for warning in self.workspace.perform_operation(&text)? {
                    report.warnings.push(LineMessage {
                        line,
                        message: warning.to_string(),
                    });
                }
            }
            Statement::Remove(name) => self.workspace.remove_variable(&name)?,
            Statement::Rename { from, to } => self.workspace.rename_variable(&from, &to)?,
            Statement::Plot {
                descriptor,
                bindings,
            } => {
                let plot = match descriptor.to_str().and_then(|name| self.workspace.operations().plot(name)) {
                    Some(plot) => plot,
                    None => {
                        let path = self.base_dir.join(descriptor);
                        let package_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
                        Arc::new(Plot::load(&path, &package_dir)?)
                    }
                };

                let mut recipe = Recipe::new(plot.clone());
                for (port, name) in bindings {
                    let variable = self
                        .workspace
                        .get_variable(&name)?
                        .ok_or(DatError::UnknownVariable(name))?;
                    recipe = recipe.bind(port, variable);
                }

                let info = self.workspace.create_pipeline(&recipe)?;
                report.pipelines.push(PipelineReport {
                    line,
                    plot: plot.name.clone(),
                    version: info.version,
                    pipeline: self.workspace.pipeline(info.version)?,
                });
            }
        }
        Ok(())
    }
}
