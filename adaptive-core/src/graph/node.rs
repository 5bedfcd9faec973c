//! Graph Nodes
//!
//! This module defines the structural records that live in the dependency
//! graph. A record knows its identity, its kind, its dirty flag and its edges.
//! Typed values live in the handles (`ChangeableValue`, `Derived`, ...), not here.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Input list of a node. Arity one and two are the common case.
pub type Inputs = SmallVec<[NodeId; 2]>;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A changeable value. Roots of the graph, set from outside inside a transaction.
    Source,

    /// A value that never changes. Also a root, but never invalidated.
    Constant,

    /// A value computed from other nodes. Caches its result.
    Derived,
}

/// Dirty state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyState {
    /// The cached output reflects the last committed transaction.
    Clean,

    /// The cached output may be stale and must be recomputed before the next read.
    Dirty,
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// What kind of node this is.
    kind: NodeKind,

    /// Dirty flag. Atomic so readers holding a shared topology lock can clear it.
    dirty: AtomicBool,

    /// Nodes that this node reads from (parents in the DAG).
    dependencies: Inputs,

    /// Nodes that read from this node (children in the DAG).
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a new node with the given kind and no edges.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            kind,
            dirty: AtomicBool::new(match kind {
                NodeKind::Source | NodeKind::Constant => false,
                // Derived nodes compute lazily on first read.
                NodeKind::Derived => true,
            }),
            dependencies: Inputs::new(),
            dependents: IndexSet::new(),
        }
    }

    /// Create a new source node.
    pub fn source() -> Self {
        Self::new(NodeKind::Source)
    }

    /// Create a new constant node.
    pub fn constant() -> Self {
        Self::new(NodeKind::Constant)
    }

    /// Create a new derived node.
    pub fn derived() -> Self {
        Self::new(NodeKind::Derived)
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Get the current dirty state.
    pub fn dirty_state(&self) -> DirtyState {
        if self.is_dirty() {
            DirtyState::Dirty
        } else {
            DirtyState::Clean
        }
    }

    /// Check if the node must be recomputed before its next read.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Check if the node's cached output is up to date.
    pub fn is_clean(&self) -> bool {
        !self.is_dirty()
    }

    /// Mark the node as clean.
    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Mark the node as dirty.
    ///
    /// Returns `true` if the node was clean before the call.
    pub fn mark_dirty(&self) -> bool {
        !self.dirty.swap(true, Ordering::AcqRel)
    }

    /// Add a dependency (a node that this node reads from).
    ///
    /// Reading the same input twice records a single edge.
    pub fn add_dependency(&mut self, node_id: NodeId) {
        if !self.dependencies.contains(&node_id) {
            self.dependencies.push(node_id);
        }
    }

    /// Remove a dependency.
    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.retain(|id| *id != node_id);
    }

    /// Get all dependencies, in input order.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    /// Get all dependents, in registration order.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }
}
