//! Derived Values
//!
//! A derived value is a cached computation over one or more input nodes.
//! It recomputes only when it is dirty and somebody reads it.
//!
//! # How Derived Values Work
//!
//! 1. A new derived value starts dirty and has no cached value.
//!
//! 2. On read, a dirty node runs its derivation function. The function
//!    pulls its inputs, which recompute first if they are dirty themselves.
//!
//! 3. On success the result is cached and the node is marked clean.
//!
//! 4. A commit that changes an upstream source marks the node dirty again.
//!
//! Nodes that are never read stay dirty and cost nothing.
//!
//! # Evaluation Order
//!
//! A read first refreshes every dirty ancestor of the node, oldest first,
//! and only then runs the node's own function. Each function therefore finds
//! its inputs already cached, so the stack depth of a read does not grow with
//! the length of the dependency chain.
//!
//! # Thread Safety
//!
//! The cache is behind a mutex that is held while the derivation function
//! runs, so concurrent readers of the same node compute it once. Derivation
//! functions only read their inputs, which are upstream, so locks are always
//! taken in edge order and cannot deadlock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::graph::AdaptiveGraph;
use super::value::Adaptive;
use crate::error::AdaptiveError;
use crate::graph::{DirtyState, NodeId, Topology};

/// A derivation function with its inputs already bound.
pub(crate) type ComputeFn<T> = Box<dyn Fn() -> Result<T, AdaptiveError> + Send + Sync>;

/// Type-erased access to a derived node's cache, used to refresh ancestors.
pub(crate) trait Evaluate: Send + Sync {
    /// Recompute the node if it is dirty.
    fn refresh(&self, topology: &Topology) -> Result<(), AdaptiveError>;
}

struct DerivedCell<T> {
    id: NodeId,
    compute: ComputeFn<T>,
    /// Last successfully computed value. `None` until the first read.
    cache: Mutex<Option<T>>,
    /// Number of successful recomputations.
    evaluations: AtomicU64,
}

impl<T> DerivedCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `f` on the up-to-date value, recomputing first if the node is dirty.
    fn with_value<R>(&self, topology: &Topology, f: impl FnOnce(&T) -> R) -> Result<R, AdaptiveError> {
        let node = topology
            .node(self.id)
            .ok_or(AdaptiveError::GraphMismatch { node: self.id })?;

        let mut cache = self.cache.lock();
        if node.is_clean() {
            if let Some(value) = cache.as_ref() {
                return Ok(f(value));
            }
        }

        trace!(node = %self.id, "recomputing derived value");
        match (self.compute)() {
            Ok(value) => {
                self.evaluations.fetch_add(1, Ordering::SeqCst);
                let result = f(&value);
                *cache = Some(value);
                node.mark_clean();
                Ok(result)
            }
            Err(err) => {
                debug!(node = %self.id, error = %err, "recomputation failed");
                Err(err)
            }
        }
    }
}

impl<T> Evaluate for DerivedCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn refresh(&self, topology: &Topology) -> Result<(), AdaptiveError> {
        self.with_value(topology, |_| ())
    }
}

/// A value computed from other adaptive values.
///
/// Created by [`Adaptive::map`], [`Adaptive::map2`],
/// [`AdaptiveGraph::map_n`] and their fallible variants.
pub struct Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: NodeId,
    graph: AdaptiveGraph,
    cell: Arc<DerivedCell<T>>,
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(id: NodeId, graph: AdaptiveGraph, compute: ComputeFn<T>) -> Self {
        let cell = Arc::new(DerivedCell {
            id,
            compute,
            cache: Mutex::new(None),
            evaluations: AtomicU64::new(0),
        });
        let evaluator: Arc<dyn Evaluate> = cell.clone();
        graph.register_evaluator(id, Arc::downgrade(&evaluator));
        Self { id, graph, cell }
    }

    /// How many times the derivation function has run successfully.
    pub fn evaluation_count(&self) -> u64 {
        self.cell.evaluations.load(Ordering::SeqCst)
    }

    /// Check if a value has been computed at least once.
    pub fn has_value(&self) -> bool {
        self.cell.cache.lock().is_some()
    }

    /// Get the node's dirty state.
    pub fn dirty_state(&self) -> DirtyState {
        self.graph.dirty_state(self.id).unwrap_or(DirtyState::Dirty)
    }
}

impl<T> Adaptive for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> NodeId {
        self.id
    }

    fn graph(&self) -> &AdaptiveGraph {
        &self.graph
    }

    fn get_value(&self) -> Result<T, AdaptiveError> {
        // Held for the whole evaluation so no commit lands halfway through.
        let topology = self.graph.read();

        for ancestor in topology.dirty_ancestors(self.id) {
            if let Some(evaluator) = self.graph.evaluator(ancestor) {
                evaluator.refresh(&topology)?;
            }
        }

        self.cell.with_value(&topology, T::clone)
    }
}

impl<T> Clone for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            graph: self.graph.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.id)
            .field("graph", &self.graph.id())
            .field("has_value", &self.has_value())
            .field("evaluations", &self.evaluation_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn derived_computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let graph = AdaptiveGraph::new();
        let a = graph.source(21);
        let doubled = a
            .map(move |v| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
                v * 2
            })
            .unwrap();

        // Not computed yet
        assert!(!doubled.has_value());
        assert_eq!(doubled.dirty_state(), DirtyState::Dirty);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // First access triggers computation
        assert_eq!(doubled.get_value().unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(doubled.has_value());
        assert_eq!(doubled.dirty_state(), DirtyState::Clean);
    }

    #[test]
    fn derived_caches_value_when_clean() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let graph = AdaptiveGraph::new();
        let a = graph.source(1);
        let plus_one = a
            .map(move |v| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
                v + 1
            })
            .unwrap();

        assert_eq!(plus_one.get_value().unwrap(), 2);
        assert_eq!(plus_one.get_value().unwrap(), 2);
        assert_eq!(plus_one.get_value().unwrap(), 2);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(plus_one.evaluation_count(), 1);
    }

    #[test]
    fn derived_recomputes_after_commit() {
        let graph = AdaptiveGraph::new();
        let a = graph.source(1);
        let squared = a.map(|v| v * v).unwrap();

        assert_eq!(squared.get_value().unwrap(), 1);

        graph.transact(|_| a.set_value(4)).unwrap();
        assert_eq!(squared.dirty_state(), DirtyState::Dirty);
        assert_eq!(squared.get_value().unwrap(), 16);
        assert_eq!(squared.evaluation_count(), 2);
    }

    #[test]
    fn failed_recomputation_is_not_cached() {
        let graph = AdaptiveGraph::new();
        let divisor = graph.source(0);
        let quotient = divisor
            .try_map(|d| {
                if d == 0 {
                    Err(anyhow::anyhow!("division by zero"))
                } else {
                    Ok(100 / d)
                }
            })
            .unwrap();

        let err = quotient.get_value().unwrap_err();
        assert_eq!(err.failed_node(), Some(quotient.id()));
        assert!(!quotient.has_value());
        assert_eq!(quotient.dirty_state(), DirtyState::Dirty);
        assert_eq!(quotient.evaluation_count(), 0);

        graph.transact(|_| divisor.set_value(4)).unwrap();
        assert_eq!(quotient.get_value().unwrap(), 25);
        assert_eq!(quotient.dirty_state(), DirtyState::Clean);
    }

    #[test]
    fn upstream_failure_propagates_unchanged() {
        let graph = AdaptiveGraph::new();
        let a = graph.source(-1);
        let checked = a
            .try_map(|v| {
                if v < 0 {
                    Err(anyhow::anyhow!("negative"))
                } else {
                    Ok(v)
                }
            })
            .unwrap();
        let doubled = checked.map(|v| v * 2).unwrap();

        let err = doubled.get_value().unwrap_err();
        // The error names the node that actually failed.
        assert_eq!(err.failed_node(), Some(checked.id()));
        assert_eq!(doubled.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn deep_chain_evaluates_without_recursion() {
        let graph = AdaptiveGraph::new();
        let source = graph.source(0u64);

        let mut chain = vec![source.map(|v| v + 1).unwrap()];
        for _ in 1..20_000 {
            let tail = chain.last().unwrap().map(|v| v + 1).unwrap();
            chain.push(tail);
        }
        let tail = chain.last().unwrap().clone();

        assert_eq!(tail.get_value().unwrap(), 20_000);

        graph.transact(|tx| tx.set(&source, 5)).unwrap();
        assert_eq!(tail.get_value().unwrap(), 20_005);
        assert_eq!(tail.evaluation_count(), 2);
        assert_eq!(chain[0].evaluation_count(), 2);

        // Release from the tail so each handle frees one link.
        drop(tail);
        while let Some(link) = chain.pop() {
            drop(link);
        }
    }

    #[test]
    fn failure_in_deep_ancestor_stops_refresh() {
        let graph = AdaptiveGraph::new();
        let source = graph.source(1i64);
        let checked = source
            .try_map(|v| {
                if v < 0 {
                    Err(anyhow::anyhow!("negative input"))
                } else {
                    Ok(v)
                }
            })
            .unwrap();

        let mut tail = checked.map(|v| v * 2).unwrap();
        let mut links = vec![tail.clone()];
        for _ in 0..100 {
            tail = tail.map(|v| v + 1).unwrap();
            links.push(tail.clone());
        }
        assert_eq!(tail.get_value().unwrap(), 102);

        graph.transact(|tx| tx.set(&source, -1)).unwrap();
        let err = tail.get_value().unwrap_err();
        assert_eq!(err.failed_node(), Some(checked.id()));
        assert!(links.iter().all(|link| link.dirty_state() == DirtyState::Dirty));

        graph.transact(|tx| tx.set(&source, 3)).unwrap();
        assert_eq!(tail.get_value().unwrap(), 106);
    }

    #[test]
    fn derived_clone_shares_state() {
        let graph = AdaptiveGraph::new();
        let a = graph.source(42);
        let first = a.map(|v| v).unwrap();

        assert_eq!(first.get_value().unwrap(), 42);

        let second = first.clone();
        assert_eq!(first.id(), second.id());
        assert!(second.has_value());
        assert_eq!(second.get_value().unwrap(), 42);
        assert_eq!(first.evaluation_count(), 1);
    }
}
