//! Serializable view of a graph, for debugging and tooling.

use serde::{Deserialize, Serialize};

use super::node::{DirtyState, NodeId, NodeKind};

/// One node as captured by [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node identity.
    pub id: NodeId,
    /// Source, constant or derived.
    pub kind: NodeKind,
    /// Dirty flag at the time of the snapshot.
    pub state: DirtyState,
    /// Inputs, in input order.
    pub dependencies: Vec<NodeId>,
    /// Nodes reading from this one, in registration order.
    pub dependents: Vec<NodeId>,
}

/// Point-in-time copy of the graph structure.
///
/// Nodes are listed in creation order, which is a topological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All nodes.
    pub nodes: Vec<NodeSnapshot>,
}

impl GraphSnapshot {
    /// Look up a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// IDs of every node that was dirty when the snapshot was taken.
    pub fn dirty_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.state == DirtyState::Dirty)
            .map(|n| n.id)
            .collect()
    }

    /// Render as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
