//! Adaptive Core
//!
//! This crate provides an incremental computation engine built on adaptive
//! values. It implements:
//!
//! - Changeable sources and constants
//! - Memoized derived values that recompute lazily
//! - Transactions that apply a batch of writes atomically
//! - Dirty propagation over the dependency graph
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `adaptive`: Value handles, transactions and the graph that owns them
//! - `graph`: Dependency topology, dirty tracking and snapshots (internal;
//!   node IDs, kinds, dirty states and snapshots are re-exported here)
//!
//! The topology itself is not reachable from outside the crate:
//!
//! ```compile_fail
//! use adaptive_core::graph::Topology;
//! ```
//!
//! # Example
//!
//! ```rust
//! use adaptive_core::{Adaptive, AdaptiveError, AdaptiveGraph};
//!
//! let graph = AdaptiveGraph::new();
//!
//! // Create sources
//! let a = graph.source(1);
//! let b = graph.source(1);
//!
//! // Create derived values
//! let c = a.map(|va| va * 2)?;
//! let d = b.map2(&c, |vb, vc| vb + vc)?;
//! assert_eq!(d.get_value()?, 3);
//!
//! // Change a source; d recomputes on its next read
//! graph.transact(|tx| tx.set(&a, 3))?;
//! assert_eq!(d.get_value()?, 7);
//! # Ok::<(), AdaptiveError>(())
//! ```

pub mod adaptive;
pub(crate) mod graph;

mod config;
mod error;

pub use adaptive::{
    Adaptive, AdaptiveGraph, ChangeableValue, CommitSummary, ConstantValue, Derived, GraphId,
    Transaction,
};
pub use config::{GraphBuilder, GraphConfig, NestedTransactions, OutsideTransaction};
pub use error::{AdaptiveError, ConfigError, InvalidState};
pub use graph::{DirtyState, GraphSnapshot, NodeId, NodeKind, NodeSnapshot};
