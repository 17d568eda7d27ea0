//! Ancestor distances over the module type lattice.
//!
//! The matcher scores an argument type against an operation's accepted types
//! by the number of inheritance steps between them. [`TypeLattice`] computes
//! the distance from a concrete type to every one of its ancestors once, by a
//! breadth-first walk over the registry's parent links (shortest path wins
//! when the ancestry is a DAG), and caches the map for later lookups.

use crate::error::{DatError, Result};
use crate::host::TypeRegistry;
use crate::types::TypeDescriptor;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

/// Distance from one concrete type to each of its ancestors (itself at 0).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorDistances {
    distances: HashMap<TypeDescriptor, u32>,
}

impl AncestorDistances {
    pub fn distance(&self, ancestor: &TypeDescriptor) -> Option<u32> {
        self.distances.get(ancestor).copied()
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

pub struct TypeLattice {
    registry: Arc<dyn TypeRegistry>,
    cache: RwLock<HashMap<TypeDescriptor, Arc<AncestorDistances>>>,
}

impl TypeLattice {
    pub fn new(registry: Arc<dyn TypeRegistry>) -> Self {
        Self {
            registry,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &dyn TypeRegistry {
        &*self.registry
    }

    /// Distance map for `concrete`, computed on first use.
    pub fn distances(&self, concrete: &TypeDescriptor) -> Result<Arc<AncestorDistances>> {
        if let Some(cached) = self
            .cache
            .read()
            .map_err(|_| DatError::LockPoisoned)?
            .get(concrete)
        {
            return Ok(cached.clone());
        }

        let computed = Arc::new(self.compute(concrete));
        self.cache
            .write()
            .map_err(|_| DatError::LockPoisoned)?
            .insert(concrete.clone(), computed.clone());
        Ok(computed)
    }

    /// Inheritance steps from `concrete` up to `ancestor`, `None` if unrelated.
    pub fn distance(&self, concrete: &TypeDescriptor, ancestor: &TypeDescriptor) -> Result<Option<u32>> {
        Ok(self.distances(concrete)?.distance(ancestor))
    }

    fn compute(&self, concrete: &TypeDescriptor) -> AncestorDistances {
        let root = self.registry.root_type();
        let mut distances = HashMap::new();
        let mut queue = VecDeque::from([(concrete.clone(), 0u32)]);

        while let Some((ty, distance)) = queue.pop_front() {
            if distances.contains_key(&ty) {
                continue;
            }
            if ty != root {
                for parent in self.registry.parents(&ty) {
                    if !distances.contains_key(&parent) {
                        queue.push_back((parent, distance + 1));
                    }
                }
            }
            distances.insert(ty, distance);
        }

        AncestorDistances { distances }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatConfig;
    use crate::host::ModuleRegistry;

    fn lattice() -> (TypeLattice, DatConfig) {
        let config = DatConfig::default();
        let mut registry = ModuleRegistry::with_basic_package(&config);
        // Diamond: Both -> (Left, Right) -> Float, with a longer route via Right
        let t = |n: &str| TypeDescriptor::new("org.example", n);
        registry.add_module(t("Right1"), &[config.basic("Float")]).unwrap();
        registry.add_module(t("Right2"), &[t("Right1")]).unwrap();
        registry
            .add_module(t("Both"), &[t("Right2"), config.basic("Integer")])
            .unwrap();
        (TypeLattice::new(Arc::new(registry)), config)
    }

    #[test]
    fn test_exact_type_is_distance_zero() {
        let (lattice, config) = lattice();
        let float = config.basic("Float");
        assert_eq!(lattice.distance(&float, &float).unwrap(), Some(0));
    }

    #[test]
    fn test_distances_along_chain() {
        let (lattice, config) = lattice();
        let integer = config.basic("Integer");
        assert_eq!(lattice.distance(&integer, &config.basic("Float")).unwrap(), Some(1));
        assert_eq!(lattice.distance(&integer, &config.basic("Constant")).unwrap(), Some(2));
        assert_eq!(lattice.distance(&integer, &config.basic("Module")).unwrap(), Some(3));
        assert_eq!(lattice.distance(&integer, &config.basic("String")).unwrap(), None);
    }

    #[test]
    fn test_shortest_route_wins_in_diamond() {
        let (lattice, config) = lattice();
        let both = TypeDescriptor::new("org.example", "Both");
        // Both -> Integer -> Float is 2 steps; Both -> Right2 -> Right1 -> Float is 3
        assert_eq!(lattice.distance(&both, &config.basic("Float")).unwrap(), Some(2));
    }

    #[test]
    fn test_unknown_type_only_reaches_itself() {
        let (lattice, config) = lattice();
        let alien = TypeDescriptor::new("org.example", "Alien");
        let distances = lattice.distances(&alien).unwrap();
        assert_eq!(distances.len(), 1);
        assert_eq!(distances.distance(&config.basic("Module")), None);
    }

    #[test]
    fn test_distances_are_cached() {
        let (lattice, config) = lattice();
        let integer = config.basic("Integer");
        let first = lattice.distances(&integer).unwrap();
        let second = lattice.distances(&integer).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
