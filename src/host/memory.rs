//! In-memory versioned graph store
//!
//! [`MemoryVistrail`] implements [`VersionStore`] without any persistence. It
//! keeps one node per version with its parent, the edits that produced it and
//! the resulting pipeline snapshot. It backs the `dat` binary and the tests,
//! and documents the behavior DAT expects from a real host store.
//!
//! # Tags
//!
//! A version carries at most one tag and a tag names at most one version, so
//! re-tagging a version replaces its old tag and reusing a tag moves it.

use crate::error::{DatError, Result};
use crate::host::graph::{Connection, GraphEdit, Module, Pipeline, PortRef};
use crate::host::id::{ConnectionId, ModuleId, VersionId};
use crate::host::VersionStore;
use crate::types::TypeDescriptor;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A node of the version tree
#[derive(Debug, Clone)]
pub struct VersionNode {
    pub parent: Option<VersionId>,
    /// Edits applied on top of the parent
    pub action: Vec<GraphEdit>,
    /// Pipeline after applying the action
    pub pipeline: Pipeline,
    pub created_at: DateTime<Utc>,
    pub annotations: BTreeMap<String, String>,
    pub pruned: bool,
}

/// In-memory version store
#[derive(Debug)]
pub struct MemoryVistrail {
    versions: BTreeMap<VersionId, VersionNode>,
    tags: BTreeMap<String, VersionId>,
    current: VersionId,
    next_version: u64,
    next_module: u64,
    next_connection: u64,
}

impl Default for MemoryVistrail {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVistrail {
    pub fn new() -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(
            VersionId::ROOT,
            VersionNode {
                parent: None,
                action: Vec::new(),
                pipeline: Pipeline::new(),
                created_at: Utc::now(),
                annotations: BTreeMap::new(),
                pruned: false,
            },
        );

        Self {
            versions,
            tags: BTreeMap::new(),
            current: VersionId::ROOT,
            next_version: 1,
            next_module: 1,
            next_connection: 1,
        }
    }

    /// Number of versions, the root included
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn version(&self, version: VersionId) -> Option<&VersionNode> {
        self.versions.get(&version)
    }

    /// Tag currently attached to a version
    pub fn tag_of(&self, version: VersionId) -> Option<&str> {
        self.tags
            .iter()
            .find(|(_, v)| **v == version)
            .map(|(name, _)| name.as_str())
    }

    fn live_node(&self, version: VersionId) -> Result<&VersionNode> {
        match self.versions.get(&version) {
            Some(node) if !node.pruned => Ok(node),
            Some(_) => Err(DatError::Host(format!("version {} was pruned", version))),
            None => Err(DatError::Host(format!("no such version {}", version))),
        }
    }
}

impl VersionStore for MemoryVistrail {
    fn current_version(&self) -> VersionId {
        self.current
    }

    fn select_version(&mut self, version: VersionId) -> Result<()> {
        self.live_node(version)?;
        self.current = version;
        Ok(())
    }

    fn create_module(&mut self, descriptor: &TypeDescriptor) -> Module {
        let id = ModuleId(self.next_module);
        self.next_module += 1;
        Module::new(id, descriptor.clone())
    }

    fn create_connection(&mut self, source: PortRef, destination: PortRef) -> Connection {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        Connection {
            id,
            source,
            destination,
        }
    }

    fn commit(&mut self, edits: Vec<GraphEdit>) -> Result<VersionId> {
        let base = self.current;
        let mut pipeline = self.live_node(base)?.pipeline.clone();
        for edit in edits.iter().cloned() {
            pipeline.apply(edit)?;
        }

        let version = VersionId(self.next_version);
        self.next_version += 1;
        tracing::debug!(
            "Committed {} edits as {} (parent {})",
            edits.len(),
            version,
            base
        );
        self.versions.insert(
            version,
            VersionNode {
                parent: Some(base),
                action: edits,
                pipeline,
                created_at: Utc::now(),
                annotations: BTreeMap::new(),
                pruned: false,
            },
        );
        self.current = version;
        Ok(version)
    }

    fn pipeline(&self, version: VersionId) -> Result<Pipeline> {
        Ok(self.live_node(version)?.pipeline.clone())
    }

    fn parent(&self, version: VersionId) -> Result<Option<VersionId>> {
        Ok(self.live_node(version)?.parent)
    }

    fn tag_version(&mut self, version: VersionId, name: &str) -> Result<()> {
        self.live_node(version)?;

        if let Some(&previous) = self.tags.get(name) {
            if previous != version {
                tracing::warn!("Moving tag {:?} from {} to {}", name, previous, version);
            }
        }
        self.tags.retain(|tag, v| *v != version && tag != name);
        self.tags.insert(name.to_string(), version);
        Ok(())
    }

    fn set_annotation(&mut self, version: VersionId, key: &str, value: &str) -> Result<()> {
        self.live_node(version)?;
        if let Some(node) = self.versions.get_mut(&version) {
            node.annotations.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn annotation(&self, version: VersionId, key: &str) -> Option<String> {
        self.live_node(version)
            .ok()
            .and_then(|node| node.annotations.get(key).cloned())
    }

    fn resolve_tag(&self, name: &str) -> Option<VersionId> {
        self.tags.get(name).copied()
    }

    fn tags(&self) -> Vec<(String, VersionId)> {
        self.tags
            .iter()
            .map(|(name, version)| (name.clone(), *version))
            .collect()
    }

    fn prune(&mut self, version: VersionId) -> Result<()> {
        if version.is_root() {
            return Err(DatError::Host("cannot prune the root version".to_string()));
        }
        let node = self
            .versions
            .get_mut(&version)
            .ok_or_else(|| DatError::Host(format!("no such version {}", version)))?;
        node.pruned = true;
        self.tags.retain(|_, v| *v != version);
        if self.current == version {
            self.current = node.parent.unwrap_or(VersionId::ROOT);
        }
        Ok(())
    }
}
