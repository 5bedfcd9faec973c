//! Error types for the adaptive value graph.

use std::sync::Arc;

use thiserror::Error;

use crate::adaptive::GraphId;
use crate::graph::NodeId;

/// Errors raised by graph construction, mutation and evaluation.
///
/// Structural errors (`InvalidState`, `Cycle`, `GraphMismatch`) are reported by
/// the call that would cause them. `Recomputation` is only reported when a
/// read actually needs the failing value.
#[derive(Debug, Clone, Error)]
pub enum AdaptiveError {
    /// The operation is not allowed in the current transaction state.
    #[error(transparent)]
    InvalidState(#[from] InvalidState),

    /// A derivation function failed.
    ///
    /// The node stays dirty, so the next read retries the computation.
    #[error("recomputation of {node} failed: {cause}")]
    Recomputation {
        /// The node whose derivation function failed.
        node: NodeId,
        /// The error returned by the derivation function.
        cause: Arc<anyhow::Error>,
    },

    /// Registering the edge would create a cycle.
    #[error("edge {dependency} -> {dependent} would create a cycle")]
    Cycle {
        /// The node that would be read from.
        dependency: NodeId,
        /// The node that would read.
        dependent: NodeId,
    },

    /// A node handle from another graph was used.
    #[error("{node} does not belong to this graph")]
    GraphMismatch {
        /// The foreign node.
        node: NodeId,
    },
}

/// Transaction state violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidState {
    /// A source was set while no transaction was open on this thread.
    #[error("cannot set {node} outside of a transaction")]
    NoTransaction {
        /// The source that was being set.
        node: NodeId,
    },

    /// A transaction was opened while another one on the same graph is open on this thread.
    #[error("a transaction on {graph} is already open on this thread")]
    NestedTransaction {
        /// The graph with the open transaction.
        graph: GraphId,
    },
}

impl AdaptiveError {
    /// Wrap a derivation failure for `node`.
    pub fn recomputation(node: NodeId, cause: impl Into<anyhow::Error>) -> Self {
        AdaptiveError::Recomputation {
            node,
            cause: Arc::new(cause.into()),
        }
    }

    /// Returns the node whose derivation failed, if this is a `Recomputation` error.
    pub fn failed_node(&self) -> Option<NodeId> {
        match self {
            AdaptiveError::Recomputation { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Attempts to downcast the derivation failure to a specific type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            AdaptiveError::Recomputation { cause, .. } => cause.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Errors raised while loading a [`GraphConfig`](crate::GraphConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid graph configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
