//! The DAT workspace
//!
//! [`Workspace`] owns the host store, the set of named variables and the
//! sealed operation snapshot. Every mutating call runs as one critical
//! section under a single lock: read variables, build, commit, register.
//!
//! # Operations
//!
//! - [`Workspace::perform_operation`] - `name = expression`
//! - [`Workspace::add_variable`] / [`Workspace::load_variable`] - new variables
//! - [`Workspace::remove_variable`] / [`Workspace::rename_variable`]
//! - [`Workspace::create_pipeline`] / [`Workspace::execute_recipe`] - plots

use crate::config::DatConfig;
use crate::error::{DatError, Result, ResultExt};
use crate::host::{
    CellInformation, Controller, ExecutionSink, Pipeline, PipelineInformation, TypeRegistry,
    VersionId, VersionStore,
};
use crate::lattice::TypeLattice;
use crate::loaders::VariableLoader;
use crate::operations::{execute, ComputeNode, OperationMatcher, OperationSnapshot, OperationWarning, Resolver};
use crate::parsing::{is_valid_variable_name, parse_expression};
use crate::pipeline::{Recipe, RecipeCompiler};
use crate::provenance::Provenance;
use crate::variable::Variable;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct WorkspaceState {
    store: Box<dyn VersionStore>,
    variables: BTreeMap<String, Arc<Variable>>,
}

/// Result of resolving an expression without executing it.
#[derive(Debug, Clone)]
pub struct ResolvedExpression {
    pub target: String,
    pub node: ComputeNode,
    pub warnings: Vec<OperationWarning>,
}

pub struct Workspace {
    config: DatConfig,
    registry: Arc<dyn TypeRegistry>,
    lattice: TypeLattice,
    operations: OperationSnapshot,
    state: Mutex<WorkspaceState>,
}

impl Workspace {
    pub fn new(
        store: Box<dyn VersionStore>,
        registry: Arc<dyn TypeRegistry>,
        operations: OperationSnapshot,
        config: DatConfig,
    ) -> Self {
        Self {
            lattice: TypeLattice::new(registry.clone()),
            registry,
            operations,
            config,
            state: Mutex::new(WorkspaceState {
                store,
                variables: BTreeMap::new(),
            }),
        }
    }

    /// Open a workspace on an existing store, registering every variable
    /// tagged `dat-var-<name>`.
    pub fn open(
        store: Box<dyn VersionStore>,
        registry: Arc<dyn TypeRegistry>,
        operations: OperationSnapshot,
        config: DatConfig,
    ) -> Result<Self> {
        let workspace = Self::new(store, registry, operations, config);
        let restored = workspace.restore_variables()?;
        tracing::info!("Opened workspace with {} variables", restored);
        Ok(workspace)
    }

    pub fn config(&self) -> &DatConfig {
        &self.config
    }

    pub fn operations(&self) -> &OperationSnapshot {
        &self.operations
    }

    fn lock(&self) -> Result<MutexGuard<'_, WorkspaceState>> {
        self.state.lock().map_err(|_| DatError::LockPoisoned)
    }

    // ==================== Expressions ====================

    /// Parse and resolve `target = expression` without touching the store.
    pub fn resolve(&self, text: &str) -> Result<ResolvedExpression> {
        let (target, expr) = parse_expression(text)?;
        let state = self.lock()?;
        let matcher = OperationMatcher::new(&self.operations, &self.lattice);
        let mut resolver = Resolver::new(&state.variables, matcher, &*self.registry, &self.config)?;
        let node = resolver.resolve(&expr)?;
        Ok(ResolvedExpression {
            target,
            node,
            warnings: resolver.into_warnings(),
        })
    }

    /// Evaluate `target = expression` and register the result as a new
    /// variable.
    ///
    /// Nothing is committed unless every step succeeds.
    ///
    /// # Returns
    /// Non-fatal warnings (e.g. ambiguous overloads)
    pub fn perform_operation(&self, text: &str) -> Result<Vec<OperationWarning>> {
        let (target, expr) = parse_expression(text)?;

        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;
        if variables.contains_key(&target) {
            return Err(DatError::DuplicateVariable(target));
        }

        let matcher = OperationMatcher::new(&self.operations, &self.lattice);
        let mut resolver = Resolver::new(&*variables, matcher, &*self.registry, &self.config)?;
        let node = resolver.resolve(&expr)?;
        let warnings = resolver.into_warnings();

        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        let variable = execute(&node, &mut controller)?;
        Self::register(&mut controller, variables, &target, variable)?;

        tracing::info!("Performed {:?}", text);
        Ok(warnings)
    }

    // ==================== Variables ====================

    /// Materialize a variable built by a caller and register it as `name`.
    pub fn add_variable(&self, name: &str, variable: Variable) -> Result<Arc<Variable>> {
        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;
        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        Self::register(&mut controller, variables, name, variable)
    }

    /// Build a variable with `loader` and register it.
    ///
    /// Without an explicit `name`, the loader's default name (or the
    /// configured one) is made unique with a `_2`, `_3`, ... suffix.
    pub fn load_variable(&self, loader: &mut dyn VariableLoader, name: Option<&str>) -> Result<String> {
        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let base = loader
                    .default_variable_name()
                    .unwrap_or_else(|| self.config.default_variable_name.clone());
                unique_name(variables, &base)
            }
        };
        if variables.contains_key(&name) {
            return Err(DatError::DuplicateVariable(name));
        }

        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        let mut variable = loader
            .load(&mut controller)
            .with_context(|| format!("Loader {} failed", loader.name()))?;
        if variable.provenance().is_none() {
            variable.set_provenance(Provenance::loader(loader.name()));
        }
        Self::register(&mut controller, variables, &name, variable)?;
        loader.reset();
        Ok(name)
    }

    /// `base` if free, otherwise the first free `base_2`, `base_3`, ...
    pub fn unique_variable_name(&self, base: &str) -> Result<String> {
        Ok(unique_name(&self.lock()?.variables, base))
    }

    pub fn get_variable(&self, name: &str) -> Result<Option<Arc<Variable>>> {
        Ok(self.lock()?.variables.get(name).cloned())
    }

    pub fn variable_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.variables.keys().cloned().collect())
    }

    /// Forget a variable and prune its version.
    pub fn remove_variable(&self, name: &str) -> Result<()> {
        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;
        let variable = variables
            .get(name)
            .cloned()
            .ok_or_else(|| DatError::UnknownVariable(name.to_string()))?;

        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        variable.remove(&mut controller)?;
        variables.remove(name);
        tracing::info!("Removed variable {:?}", name);
        Ok(())
    }

    /// Rename a variable; renaming to the current name only re-applies the tag.
    pub fn rename_variable(&self, old_name: &str, new_name: &str) -> Result<()> {
        if !is_valid_variable_name(new_name) {
            return Err(DatError::InvalidVariableName(new_name.to_string()));
        }

        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;
        let variable = variables
            .get(old_name)
            .cloned()
            .ok_or_else(|| DatError::UnknownVariable(old_name.to_string()))?;
        if old_name != new_name && variables.contains_key(new_name) {
            return Err(DatError::DuplicateVariable(new_name.to_string()));
        }

        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        variable.rename(&mut controller, new_name)?;
        variables.remove(old_name);
        variables.insert(new_name.to_string(), variable);
        tracing::info!("Renamed variable {:?} to {:?}", old_name, new_name);
        Ok(())
    }

    /// Register every variable tagged in the store that is not known yet.
    ///
    /// # Returns
    /// Number of variables registered
    pub fn restore_variables(&self) -> Result<usize> {
        let mut guard = self.lock()?;
        let WorkspaceState { store, variables } = &mut *guard;

        let tagged: Vec<(String, VersionId)> = store
            .tags()
            .into_iter()
            .filter_map(|(tag, version)| {
                self.config
                    .variable_name_from_tag(&tag)
                    .map(|name| (name.to_string(), version))
            })
            .collect();

        let mut controller = Controller::new(&mut **store, &*self.registry, &self.config);
        let mut restored = 0;
        for (name, version) in tagged {
            if variables.contains_key(&name) {
                continue;
            }
            match Variable::from_committed(&mut controller, version) {
                Ok(variable) => {
                    variables.insert(name, Arc::new(variable));
                    restored += 1;
                }
                Err(e) => tracing::warn!("Skipping variable {:?} at {}: {}", name, version, e),
            }
        }
        Ok(restored)
    }

    // ==================== Plots ====================

    /// Compile a recipe into a new pipeline version.
    pub fn create_pipeline(&self, recipe: &Recipe) -> Result<PipelineInformation> {
        let mut guard = self.lock()?;
        let mut controller = Controller::new(&mut *guard.store, &*self.registry, &self.config);
        RecipeCompiler::compile(&mut controller, recipe)
    }

    /// Compile a recipe and hand it to the execution engine.
    ///
    /// The sink is called after the workspace lock is released.
    pub fn execute_recipe(
        &self,
        recipe: &Recipe,
        destination: &CellInformation,
        sink: &dyn ExecutionSink,
    ) -> Result<PipelineInformation> {
        let pipeline = self.create_pipeline(recipe)?;
        sink.execute(pipeline, destination)?;
        Ok(pipeline)
    }

    /// Committed graph at a version.
    pub fn pipeline(&self, version: VersionId) -> Result<Pipeline> {
        self.lock()?.store.pipeline(version)
    }

    /// Read-only access to the store, e.g. to inspect tags.
    pub fn with_store<R>(&self, f: impl FnOnce(&dyn VersionStore) -> R) -> Result<R> {
        let state = self.lock()?;
        Ok(f(&*state.store))
    }

    /// Give the store back, e.g. to reopen it in a later session.
    pub fn into_store(self) -> Result<Box<dyn VersionStore>> {
        let state = self.state.into_inner().map_err(|_| DatError::LockPoisoned)?;
        Ok(state.store)
    }

    fn register(
        controller: &mut Controller<'_>,
        variables: &mut BTreeMap<String, Arc<Variable>>,
        name: &str,
        mut variable: Variable,
    ) -> Result<Arc<Variable>> {
        if !is_valid_variable_name(name) {
            return Err(DatError::InvalidVariableName(name.to_string()));
        }
        if variables.contains_key(name) {
            return Err(DatError::DuplicateVariable(name.to_string()));
        }
        variable.materialize(controller, name)?;
        let variable = Arc::new(variable);
        variables.insert(name.to_string(), variable.clone());
        Ok(variable)
    }
}

fn unique_name(variables: &BTreeMap<String, Arc<Variable>>, base: &str) -> String {
    if !variables.contains_key(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !variables.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}
