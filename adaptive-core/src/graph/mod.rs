//! Dependency Graph
//!
//! This module implements the structural dependency graph behind every
//! adaptive value.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent changeable sources, constants or derived values
//! - Edges represent dependencies: if A reads from B, there is an edge from B to A
//!
//! When a transaction commits, we traverse the graph from every changed source
//! and mark the affected nodes dirty. Dirty derived nodes recompute on their
//! next read.
//!
//! Edges are only added when a node is created, and a new node has no
//! dependents yet, so the graph stays acyclic by construction. Edge
//! registration still checks for cycles and rejects them.

mod node;
mod snapshot;
mod topology;

pub use node::{DirtyState, Inputs, Node, NodeId, NodeKind};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
pub use topology::Topology;
