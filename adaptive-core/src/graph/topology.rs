//! Graph Topology
//!
//! The topology owns the structural record of every node in a graph and
//! performs dirty propagation after a commit.
//!
//! # Algorithm
//!
//! When a transaction commits, each source whose value changed is handed to
//! [`Topology::invalidate`]:
//!
//! 1. Seed a queue with the direct dependents of every changed source
//! 2. Pop a node; skip it if it was already visited in this pass
//! 3. Mark it dirty. If it was clean, enqueue its dependents
//! 4. A node that was already dirty is not traversed further: its dependents
//!    were marked when it became dirty, and stay dirty until it is recomputed
//!
//! Recomputation is not scheduled here. Derived nodes are pulled lazily.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use super::node::{DirtyState, Node, NodeId};
use super::snapshot::{GraphSnapshot, NodeSnapshot};
use crate::error::AdaptiveError;

/// Structural dependency graph, indexed by node ID.
///
/// Nodes are kept in creation order. Because a node can only read from nodes
/// that already exist, creation order is also a topological order.
#[derive(Debug, Default)]
pub struct Topology {
    /// All nodes in the graph, indexed by ID.
    nodes: IndexMap<NodeId, Node>,
}

impl Topology {
    /// Create a new empty topology.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Add a node with no inputs.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Add a node together with edges from each of its inputs.
    ///
    /// Either every edge is registered or the node is not added at all.
    pub fn add_derived(&mut self, node: Node, inputs: &[NodeId]) -> Result<NodeId, AdaptiveError> {
        let id = self.add_node(node);
        for &input in inputs {
            if let Err(err) = self.add_edge(input, id) {
                self.remove_node(id);
                return Err(err);
            }
        }
        Ok(id)
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node.
    pub fn remove_node(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.shift_remove(&node_id) {
            for dep_id in node.dependencies() {
                if let Some(dep) = self.nodes.get_mut(dep_id) {
                    dep.remove_dependent(node_id);
                }
            }

            for dependent_id in node.dependents() {
                if let Some(dependent) = self.nodes.get_mut(dependent_id) {
                    dependent.remove_dependency(node_id);
                }
            }
        }
    }

    /// Get a reference to a node.
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get the dirty state of a node.
    pub fn dirty_state(&self, node_id: NodeId) -> Option<DirtyState> {
        self.nodes.get(&node_id).map(Node::dirty_state)
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    ///
    /// Rejects edges that would close a cycle, including self-edges.
    pub fn add_edge(&mut self, dependency: NodeId, dependent: NodeId) -> Result<(), AdaptiveError> {
        for id in [dependency, dependent] {
            if !self.nodes.contains_key(&id) {
                return Err(AdaptiveError::GraphMismatch { node: id });
            }
        }

        if dependency == dependent || self.reaches(dependent, dependency) {
            return Err(AdaptiveError::Cycle {
                dependency,
                dependent,
            });
        }

        if let Some(dep_node) = self.nodes.get_mut(&dependency) {
            dep_node.add_dependent(dependent);
        }
        if let Some(dependent_node) = self.nodes.get_mut(&dependent) {
            dependent_node.add_dependency(dependency);
        }
        Ok(())
    }

    /// Check whether `to` is reachable from `from` by following dependents.
    fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(node_id) = stack.pop() {
            if node_id == to {
                return true;
            }
            if !visited.insert(node_id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&node_id) {
                stack.extend(node.dependents().iter().copied());
            }
        }

        false
    }

    /// Mark everything downstream of the changed sources as dirty.
    ///
    /// Returns the number of nodes that went from clean to dirty.
    pub fn invalidate(&self, changed: &[NodeId]) -> usize {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut marked = 0;

        for source_id in changed {
            if let Some(source) = self.nodes.get(source_id) {
                queue.extend(source.dependents().iter().copied());
            }
        }

        while let Some(node_id) = queue.pop_front() {
            if !visited.insert(node_id) {
                continue;
            }

            if let Some(node) = self.nodes.get(&node_id) {
                if node.mark_dirty() {
                    marked += 1;
                    queue.extend(node.dependents().iter().copied());
                }
            }
        }

        marked
    }

    /// Dirty nodes upstream of `node_id`, oldest first.
    ///
    /// Creation order is a topological order, so evaluating the result front
    /// to back finds every input of a node already clean. A clean node has no
    /// dirty ancestors, so the walk only follows dirty dependencies.
    pub fn dirty_ancestors(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let Some(node) = self.nodes.get(&node_id) else {
            return found;
        };
        if node.is_clean() {
            return found;
        }

        let mut visited = HashSet::new();
        let mut stack = node.dependencies().to_vec();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(dep) = self.nodes.get(&id) {
                if dep.is_dirty() {
                    found.push(id);
                    stack.extend_from_slice(dep.dependencies());
                }
            }
        }

        found.sort_by_key(|id| self.nodes.get_index_of(id));
        found
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Capture the current structure and dirty flags.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .nodes
                .values()
                .map(|node| NodeSnapshot {
                    id: node.id(),
                    kind: node.kind(),
                    state: node.dirty_state(),
                    dependencies: node.dependencies().to_vec(),
                    dependents: node.dependents().iter().copied().collect(),
                })
                .collect(),
        }
    }
}
