//! Transactions
//!
//! A [`Transaction`] is an RAII guard. While it is alive, writes to sources
//! of its graph are staged; when the last transaction guard on the thread
//! goes away, the staged writes are applied and their dependents
//! invalidated in one step.
//!
//! Dropping the guard commits, so a transaction is committed on every exit
//! path: normal return, early `?` return and panic unwinding alike.

use std::any::Any;
use std::fmt;

use tracing::trace;

use super::context::TransactionContext;
use super::graph::{AdaptiveGraph, WriterGuard};
use super::source::ChangeableValue;
use super::value::Adaptive;
use crate::error::AdaptiveError;

/// A type-erased write waiting for commit.
pub(crate) trait StagedWrite: Send {
    /// Store the value. Returns `false` if it was skipped as equal.
    fn apply(self: Box<Self>, skip_equal: bool) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// What a commit did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Sources whose value changed.
    pub written: usize,
    /// Sources set to a value equal to their current one.
    pub unchanged: usize,
    /// Nodes newly marked dirty.
    pub invalidated: usize,
}

/// An open transaction on an [`AdaptiveGraph`].
///
/// Created by [`AdaptiveGraph::begin_transaction`]. Only one thread can
/// have a transaction open on a graph at a time.
pub struct Transaction<'g> {
    graph: &'g AdaptiveGraph,
    finished: bool,
    // Dropped in this order: context entry first, then the writer lock.
    _context: TransactionContext,
    _writer: WriterGuard<'g>,
}

impl<'g> Transaction<'g> {
    pub(crate) fn new(
        graph: &'g AdaptiveGraph,
        writer: WriterGuard<'g>,
        context: TransactionContext,
    ) -> Self {
        Self {
            graph,
            finished: false,
            _context: context,
            _writer: writer,
        }
    }

    /// Stage a new value for `source`.
    ///
    /// Equivalent to `source.set_value(value)`, but also checks that the
    /// source belongs to this transaction's graph.
    pub fn set<T>(&self, source: &ChangeableValue<T>, value: T) -> Result<(), AdaptiveError>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.graph.ensure_member(source.graph(), source.id())?;
        source.stage(value);
        Ok(())
    }

    /// The graph this transaction writes to.
    pub fn graph(&self) -> &AdaptiveGraph {
        self.graph
    }

    /// Check if an outer transaction on the same graph is still open.
    ///
    /// Committing a nested transaction does nothing; its writes are applied
    /// together with the outer transaction's.
    pub fn is_nested(&self) -> bool {
        TransactionContext::depth(self.graph.id()) > 1
    }

    /// Commit now and report what changed.
    ///
    /// Dropping the transaction has the same effect without the summary.
    pub fn commit(mut self) -> CommitSummary {
        self.finished = true;
        if self.is_nested() {
            return CommitSummary::default();
        }
        self.graph.commit()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if self.is_nested() {
            trace!(graph = %self.graph.id(), "nested transaction closed");
            return;
        }
        self.graph.commit();
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("graph", &self.graph.id())
            .field("nested", &self.is_nested())
            .finish()
    }
}
