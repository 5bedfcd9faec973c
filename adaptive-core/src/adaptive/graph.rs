//! Adaptive Graph
//!
//! The graph is the central coordinator that connects sources, constants and
//! derived values. It owns the dependency topology, serializes transactions
//! and applies staged writes on commit.
//!
//! # How It Works
//!
//! 1. Creating a source, constant or derived value registers a node in the
//!    topology. Derived values register an edge from each input.
//!
//! 2. Setting a source inside a transaction stages the new value. Nothing is
//!    visible to readers yet.
//!
//! 3. When the last open transaction on the thread closes, the graph:
//!    a. Takes the topology write lock, so no read is in flight
//!    b. Applies every staged value
//!    c. Marks everything downstream of a changed source as dirty
//!
//! 4. Derived values are lazy: they recompute on their next read.
//!
//! # Thread Safety
//!
//! Every read holds a shared (recursive) topology lock for its whole
//! evaluation, and commits take the exclusive lock. Readers therefore see
//! either all or none of a transaction. Transactions are serialized by a
//! reentrant writer lock, which lets a thread nest transactions on the same
//! graph without deadlocking itself.
//!
//! Reads do not queue behind a waiting commit. A steady stream of
//! overlapping reads from several threads can therefore delay a commit for
//! as long as the stream lasts.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock, RwLockReadGuard};
use tracing::{debug, trace};

use super::context::TransactionContext;
use super::derived::{ComputeFn, Derived, Evaluate};
use super::source::{ChangeableValue, ConstantValue};
use super::transaction::{CommitSummary, StagedWrite, Transaction};
use super::value::Adaptive;
use crate::config::{GraphBuilder, GraphConfig, NestedTransactions};
use crate::error::{AdaptiveError, InvalidState};
use crate::graph::{DirtyState, GraphSnapshot, Inputs, Node, NodeId, Topology};

/// Unique identifier for a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(u64);

impl GraphId {
    /// Generate a new unique graph ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "graph#{}", self.0)
    }
}

/// Shared state behind every handle of one graph.
struct GraphInner {
    id: GraphId,
    config: GraphConfig,
    /// Structure and dirty flags. Readers share it, commits take it exclusively.
    topology: RwLock<Topology>,
    /// Held by every open transaction guard. Reentrant so a thread can nest.
    writer: ReentrantMutex<()>,
    /// Writes staged by the open transaction, last write per source wins.
    staged: Mutex<IndexMap<NodeId, Box<dyn StagedWrite>>>,
    /// Caches of derived nodes, for refreshing ancestors before a read.
    evaluators: Mutex<HashMap<NodeId, Weak<dyn Evaluate>>>,
}

/// A graph of adaptive values.
///
/// This is cheap to clone - all data is behind `Arc`. Every value created
/// from a graph keeps it alive.
///
/// # Example
///
/// ```rust
/// use adaptive_core::{Adaptive, AdaptiveGraph};
///
/// let graph = AdaptiveGraph::new();
/// let a = graph.source(1);
/// let b = graph.source(1);
///
/// let c = a.map(|va| va * 2).unwrap();
/// let d = b.map2(&c, |vb, vc| vb + vc).unwrap();
/// assert_eq!(d.get_value().unwrap(), 3);
///
/// graph.transact(|_| a.set_value(3)).unwrap();
/// assert_eq!(d.get_value().unwrap(), 7);
/// ```
#[derive(Clone)]
pub struct AdaptiveGraph {
    inner: Arc<GraphInner>,
}

impl Default for AdaptiveGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveGraph {
    /// Create a new graph with default settings.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Create a new graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                id: GraphId::new(),
                config,
                topology: RwLock::new(Topology::new()),
                writer: ReentrantMutex::new(()),
                staged: Mutex::new(IndexMap::new()),
                evaluators: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a builder for customizing the graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Get the graph's unique ID.
    pub fn id(&self) -> GraphId {
        self.inner.id
    }

    /// Get the graph's configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Create a changeable source value.
    pub fn source<T>(&self, value: T) -> ChangeableValue<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let id = self.inner.topology.write().add_node(Node::source());
        trace!(graph = %self.id(), node = %id, "created source");
        ChangeableValue::new(id, self.clone(), value)
    }

    /// Create a value that never changes.
    pub fn constant<T>(&self, value: T) -> ConstantValue<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = self.inner.topology.write().add_node(Node::constant());
        trace!(graph = %self.id(), node = %id, "created constant");
        ConstantValue::new(id, self.clone(), value)
    }

    /// Derive a value from any number of inputs of the same type.
    ///
    /// `f` receives the input values in the order of `inputs`.
    pub fn map_n<A, U, F>(&self, inputs: &[A], f: F) -> Result<Derived<U>, AdaptiveError>
    where
        A: Adaptive,
        U: Clone + Send + Sync + 'static,
        F: Fn(&[A::Value]) -> U + Send + Sync + 'static,
    {
        for input in inputs {
            self.ensure_member(input.graph(), input.id())?;
        }

        let ids: Inputs = inputs.iter().map(|input| input.id()).collect();
        let inputs = inputs.to_vec();
        self.derive(ids, move |_| -> ComputeFn<U> {
            Box::new(move || {
                let values = inputs
                    .iter()
                    .map(|input| input.get_value())
                    .collect::<Result<Vec<_>, AdaptiveError>>()?;
                Ok(f(&values))
            })
        })
    }

    /// Open a transaction.
    ///
    /// Blocks while another thread has a transaction open on this graph. If
    /// this thread already has one open, the configured
    /// [`NestedTransactions`] policy applies.
    ///
    /// Staged writes are committed when the last open transaction on this
    /// thread is dropped or committed, on every exit path.
    pub fn begin_transaction(&self) -> Result<Transaction<'_>, AdaptiveError> {
        let nested = TransactionContext::is_open(self.id());
        if nested && self.inner.config.nested_transactions == NestedTransactions::Reject {
            return Err(InvalidState::NestedTransaction { graph: self.id() }.into());
        }

        let writer = self.inner.writer.lock();
        let context = TransactionContext::enter(self.id());
        trace!(graph = %self.id(), nested, "transaction opened");
        Ok(Transaction::new(self, writer, context))
    }

    /// Run `f` inside a transaction and commit afterwards.
    ///
    /// The transaction commits whether `f` succeeds or fails.
    ///
    /// # Example
    ///
    /// ```rust
    /// use adaptive_core::{Adaptive, AdaptiveError, AdaptiveGraph};
    ///
    /// let graph = AdaptiveGraph::new();
    /// let x = graph.source(1);
    /// let y = graph.source(2);
    ///
    /// graph.transact(|tx| -> Result<(), AdaptiveError> {
    ///     tx.set(&x, 10)?;
    ///     tx.set(&y, 20)?;
    ///     Ok(())
    /// })?;
    /// assert_eq!(x.get_value()? + y.get_value()?, 30);
    /// # Ok::<(), AdaptiveError>(())
    /// ```
    pub fn transact<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, E>,
        E: From<AdaptiveError>,
    {
        let tx = self.begin_transaction()?;
        let result = f(&tx);
        tx.commit();
        result
    }

    /// Check if the current thread has a transaction open on this graph.
    pub fn is_in_transaction(&self) -> bool {
        TransactionContext::is_open(self.id())
    }

    /// Get the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    /// Get the dirty state of a node, or `None` if it is not part of this graph.
    pub fn dirty_state(&self, node: NodeId) -> Option<DirtyState> {
        self.read().dirty_state(node)
    }

    /// Capture the graph structure and dirty flags.
    pub fn snapshot(&self) -> GraphSnapshot {
        self.read().snapshot()
    }

    /// Shared topology access for the duration of a read.
    ///
    /// Recursive so that nested reads during evaluation never queue behind a
    /// waiting commit.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Topology> {
        self.inner.topology.read_recursive()
    }

    /// Register a derived node and build its compute function.
    ///
    /// `build` receives the new node's ID so the function can name itself in
    /// errors.
    pub(crate) fn derive<U, B>(&self, inputs: Inputs, build: B) -> Result<Derived<U>, AdaptiveError>
    where
        U: Clone + Send + Sync + 'static,
        B: FnOnce(NodeId) -> ComputeFn<U>,
    {
        let node = Node::derived();
        let id = node.id();
        let compute = build(id);
        self.inner.topology.write().add_derived(node, &inputs)?;
        trace!(graph = %self.id(), node = %id, inputs = inputs.len(), "created derived value");
        Ok(Derived::new(id, self.clone(), compute))
    }

    pub(crate) fn register_evaluator(&self, node: NodeId, evaluator: Weak<dyn Evaluate>) {
        self.inner.evaluators.lock().insert(node, evaluator);
    }

    /// The cache of a derived node, if any handle to it is still alive.
    pub(crate) fn evaluator(&self, node: NodeId) -> Option<Arc<dyn Evaluate>> {
        self.inner.evaluators.lock().get(&node).and_then(Weak::upgrade)
    }

    /// Fail unless `other` is this graph.
    pub(crate) fn ensure_member(&self, other: &AdaptiveGraph, node: NodeId) -> Result<(), AdaptiveError> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            Ok(())
        } else {
            Err(AdaptiveError::GraphMismatch { node })
        }
    }

    /// Stage a write for the open transaction. Replaces any earlier write to the same node.
    pub(crate) fn stage(&self, node: NodeId, write: Box<dyn StagedWrite>) {
        self.inner.staged.lock().insert(node, write);
    }

    /// Run `f` on the value staged for `node`, if any.
    pub(crate) fn with_staged<R>(&self, node: NodeId, f: impl FnOnce(&dyn StagedWrite) -> R) -> Option<R> {
        let staged = self.inner.staged.lock();
        staged.get(&node).map(|write| f(write.as_ref()))
    }

    /// Apply every staged write and propagate invalidation.
    pub(crate) fn commit(&self) -> CommitSummary {
        let writes = std::mem::take(&mut *self.inner.staged.lock());
        if writes.is_empty() {
            return CommitSummary::default();
        }

        let skip_equal = self.inner.config.skip_equal_writes;
        let mut summary = CommitSummary::default();
        let mut changed = Vec::with_capacity(writes.len());

        let topology = self.inner.topology.write();
        for (node, write) in writes {
            if write.apply(skip_equal) {
                changed.push(node);
                summary.written += 1;
            } else {
                trace!(graph = %self.id(), node = %node, "skipped equal write");
                summary.unchanged += 1;
            }
        }
        summary.invalidated = topology.invalidate(&changed);
        drop(topology);

        debug!(
            graph = %self.id(),
            written = summary.written,
            unchanged = summary.unchanged,
            invalidated = summary.invalidated,
            "transaction committed"
        );
        summary
    }
}

impl fmt::Debug for AdaptiveGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveGraph")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("node_count", &self.node_count())
            .finish()
    }
}

/// Writer lock held by an open transaction guard.
pub(crate) type WriterGuard<'g> = ReentrantMutexGuard<'g, ()>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn graph_ids_are_unique() {
        assert_ne!(AdaptiveGraph::new().id(), AdaptiveGraph::new().id());
    }

    #[test]
    fn clone_shares_state() {
        let graph = AdaptiveGraph::new();
        let other = graph.clone();

        let _a = graph.source(1);
        assert_eq!(other.node_count(), 1);
        assert_eq!(other.id(), graph.id());
    }

    #[test]
    fn nodes_register_with_kind() {
        let graph = AdaptiveGraph::new();
        let a = graph.source(1);
        let k = graph.constant(2);
        let sum = a.map2(&k, |a, k| a + k).unwrap();

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.node(a.id()).unwrap().kind, NodeKind::Source);
        assert_eq!(snapshot.node(k.id()).unwrap().kind, NodeKind::Constant);
        assert_eq!(
            snapshot.node(sum.id()).unwrap().dependencies,
            vec![a.id(), k.id()]
        );
    }

    #[test]
    fn empty_commit_reports_nothing() {
        let graph = AdaptiveGraph::new();
        let summary = graph.begin_transaction().unwrap().commit();
        assert_eq!(summary, CommitSummary::default());
    }

    #[test]
    fn map_n_combines_inputs_in_order() {
        let graph = AdaptiveGraph::new();
        let inputs = vec![graph.source(1), graph.source(2), graph.source(3)];

        let digits = graph
            .map_n(&inputs, |values| {
                values.iter().fold(0, |acc, v| acc * 10 + v)
            })
            .unwrap();
        assert_eq!(digits.get_value().unwrap(), 123);

        graph.transact(|_| inputs[1].set_value(9)).unwrap();
        assert_eq!(digits.get_value().unwrap(), 193);
    }

    #[test]
    fn map_n_rejects_foreign_inputs() {
        let graph = AdaptiveGraph::new();
        let other = AdaptiveGraph::new();
        let foreign = other.source(1);

        let err = graph
            .map_n(&[graph.source(1), foreign.clone()], |v: &[i32]| v.len())
            .unwrap_err();
        assert!(matches!(err, AdaptiveError::GraphMismatch { node } if node == foreign.id()));
    }

    #[test]
    fn dirty_state_of_unknown_node_is_none() {
        let graph = AdaptiveGraph::new();
        assert!(graph.dirty_state(NodeId::new()).is_none());
    }
}
