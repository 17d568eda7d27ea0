//! Operation registry
//!
//! Operations are registered while packages load, then the registry is
//! frozen into an [`OperationSnapshot`] that matching reads without locking.
//! [`global`] wraps one process-wide registry with an explicit
//! init → install → seal lifecycle.

use super::builtins::builtin_operations;
use super::Operation;
use crate::config::DatConfig;
use crate::pipeline::Plot;
use std::sync::Arc;

/// A package contributing operations and plots.
pub trait OperationProvider {
    /// Package identifier stamped on operations that do not name one.
    fn package(&self) -> &str;

    fn operations(&self) -> Vec<Operation>;

    fn plots(&self) -> Vec<Plot> {
        Vec::new()
    }
}

/// Mutable registry used while packages load.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    provided: Vec<Arc<Operation>>,
    builtins: Vec<Arc<Operation>>,
    plots: Vec<Arc<Plot>>,
}

impl OperationRegistry {
    /// An empty registry without the built-in operations.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins(config: &DatConfig) -> Self {
        Self {
            builtins: builtin_operations(config).into_iter().map(Arc::new).collect(),
            ..Self::default()
        }
    }

    pub fn register(&mut self, operation: Operation) {
        tracing::debug!("Registered operation {}", operation);
        self.provided.push(Arc::new(operation));
    }

    /// Register every operation and plot of a provider.
    ///
    /// # Returns
    /// Number of operations registered
    pub fn install_provider(&mut self, provider: &dyn OperationProvider) -> usize {
        let operations = provider.operations();
        let count = operations.len();
        for mut operation in operations {
            if operation.package.is_empty() {
                operation.package = provider.package().to_string();
            }
            self.register(operation);
        }
        let plots = provider.plots();
        let plot_count = plots.len();
        self.plots.extend(plots.into_iter().map(Arc::new));
        tracing::info!(
            "Installed {} operations and {} plots from {}",
            count,
            plot_count,
            provider.package()
        );
        count
    }

    pub fn len(&self) -> usize {
        self.provided.len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> OperationSnapshot {
        OperationSnapshot {
            provided: self.provided.clone().into(),
            builtins: self.builtins.clone().into(),
            plots: self.plots.clone().into(),
        }
    }
}

/// Immutable, cheaply clonable view of the registered operations.
#[derive(Debug, Clone)]
pub struct OperationSnapshot {
    provided: Arc<[Arc<Operation>]>,
    builtins: Arc<[Arc<Operation>]>,
    plots: Arc<[Arc<Plot>]>,
}

impl OperationSnapshot {
    /// Operations usable from expressions with this name: provided operations
    /// in registration order, then built-ins.
    pub fn candidates(&self, name: &str) -> Vec<Arc<Operation>> {
        self.operations()
            .filter(|op| op.name == name && op.usable_in_command)
            .cloned()
            .collect()
    }

    /// Plots contributed by providers, in installation order.
    pub fn plots(&self) -> &[Arc<Plot>] {
        &self.plots
    }

    /// First plot with this name.
    pub fn plot(&self, name: &str) -> Option<Arc<Plot>> {
        self.plots.iter().find(|plot| plot.name == name).cloned()
    }

    /// Every operation, provided first.
    pub fn operations(&self) -> impl Iterator<Item = &Arc<Operation>> + '_ {
        self.provided.iter().chain(self.builtins.iter())
    }

    pub fn len(&self) -> usize {
        self.provided.len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide registry.
///
/// `init` once at startup, `install_provider` for each package, then `seal`.
/// Installing after sealing is an error; matching uses the sealed snapshot.
pub mod global {
    use super::{OperationProvider, OperationRegistry, OperationSnapshot};
    use crate::config::DatConfig;
    use crate::error::{DatError, Result};
    use crate::operations::Operation;
    use std::sync::RwLock;

    enum State {
        Uninitialized,
        Open(OperationRegistry),
        Sealed(OperationSnapshot),
    }

    static REGISTRY: RwLock<State> = RwLock::new(State::Uninitialized);

    fn write() -> Result<std::sync::RwLockWriteGuard<'static, State>> {
        REGISTRY.write().map_err(|_| DatError::LockPoisoned)
    }

    /// Create the registry with the built-in operations.
    pub fn init(config: &DatConfig) -> Result<()> {
        let mut state = write()?;
        match *state {
            State::Uninitialized => {
                *state = State::Open(OperationRegistry::with_builtins(config));
                Ok(())
            }
            _ => Err(DatError::Registry("operation registry is already initialized".into())),
        }
    }

    pub fn install_provider(provider: &dyn OperationProvider) -> Result<usize> {
        match &mut *write()? {
            State::Open(registry) => Ok(registry.install_provider(provider)),
            State::Uninitialized => Err(DatError::Registry("operation registry is not initialized".into())),
            State::Sealed(_) => Err(DatError::Registry(format!(
                "cannot install {} after the operation registry was sealed",
                provider.package()
            ))),
        }
    }

    pub fn register(operation: Operation) -> Result<()> {
        match &mut *write()? {
            State::Open(registry) => {
                registry.register(operation);
                Ok(())
            }
            State::Uninitialized => Err(DatError::Registry("operation registry is not initialized".into())),
            State::Sealed(_) => Err(DatError::Registry(format!(
                "cannot register {} after the operation registry was sealed",
                operation.name
            ))),
        }
    }

    /// Freeze the registry. Sealing twice returns the same snapshot.
    pub fn seal() -> Result<OperationSnapshot> {
        let mut state = write()?;
        let snapshot = match &*state {
            State::Uninitialized => {
                return Err(DatError::Registry("operation registry is not initialized".into()))
            }
            State::Open(registry) => registry.snapshot(),
            State::Sealed(snapshot) => return Ok(snapshot.clone()),
        };
        tracing::info!("Sealed operation registry with {} operations", snapshot.len());
        *state = State::Sealed(snapshot.clone());
        Ok(snapshot)
    }

    /// The sealed snapshot.
    pub fn snapshot() -> Result<OperationSnapshot> {
        match &*REGISTRY.read().map_err(|_| DatError::LockPoisoned)? {
            State::Sealed(snapshot) => Ok(snapshot.clone()),
            _ => Err(DatError::Registry("operation registry is not sealed".into())),
        }
    }

    /// Drop all registered operations so the registry can be initialized
    /// again (package reload).
    pub fn reset() -> Result<()> {
        *write()? = State::Uninitialized;
        Ok(())
    }
}
