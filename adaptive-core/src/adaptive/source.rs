//! Sources and Constants
//!
//! A [`ChangeableValue`] is the only kind of node that can be written. It
//! holds a value and stages new values in the open transaction; the value
//! becomes visible when the transaction commits.
//!
//! A [`ConstantValue`] is fixed at creation and never invalidates anything.
//!
//! # Memory Layout
//!
//! A handle is the node ID, a graph handle and an `Arc` to the shared cell,
//! so cloning a handle never copies the value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::graph::AdaptiveGraph;
use super::transaction::StagedWrite;
use super::value::Adaptive;
use crate::config::OutsideTransaction;
use crate::error::{AdaptiveError, InvalidState};
use crate::graph::NodeId;

/// Committed value of a source.
pub(crate) struct SourceCell<T> {
    value: RwLock<T>,
}

/// A value staged for a source, applied on commit.
pub(crate) struct PendingWrite<T> {
    cell: Arc<SourceCell<T>>,
    value: T,
}

impl<T> StagedWrite for PendingWrite<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn apply(self: Box<Self>, skip_equal: bool) -> bool {
        let mut current = self.cell.value.write();
        if skip_equal && *current == self.value {
            return false;
        }
        *current = self.value;
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A source value that can be set inside a transaction.
///
/// # Example
///
/// ```rust
/// use adaptive_core::{Adaptive, AdaptiveGraph};
///
/// let graph = AdaptiveGraph::new();
/// let count = graph.source(0);
///
/// // Writes go through a transaction
/// graph.transact(|_| count.update(|c| c + 5)).unwrap();
/// assert_eq!(count.get_value().unwrap(), 5);
///
/// // Outside one they are rejected by default
/// assert!(count.set_value(6).is_err());
/// ```
pub struct ChangeableValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    id: NodeId,
    graph: AdaptiveGraph,
    cell: Arc<SourceCell<T>>,
}

impl<T> ChangeableValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(id: NodeId, graph: AdaptiveGraph, value: T) -> Self {
        Self {
            id,
            graph,
            cell: Arc::new(SourceCell {
                value: RwLock::new(value),
            }),
        }
    }

    /// Set a new value.
    ///
    /// Inside a transaction the value is staged and the last write before
    /// commit wins. Outside one, the graph's [`OutsideTransaction`] policy
    /// applies.
    pub fn set_value(&self, value: T) -> Result<(), AdaptiveError> {
        self.write(move || value)
    }

    /// Set the value to `f` applied to the current one.
    ///
    /// "Current" includes a value staged earlier in the same transaction.
    pub fn update<F>(&self, f: F) -> Result<(), AdaptiveError>
    where
        F: FnOnce(&T) -> T,
    {
        self.write(|| f(&self.pending_or_committed()))
    }

    /// Stage a value without checking the transaction state.
    pub(crate) fn stage(&self, value: T) {
        self.graph.stage(
            self.id,
            Box::new(PendingWrite {
                cell: Arc::clone(&self.cell),
                value,
            }),
        );
    }

    fn write(&self, next: impl FnOnce() -> T) -> Result<(), AdaptiveError> {
        if self.graph.is_in_transaction() {
            self.stage(next());
            return Ok(());
        }

        match self.graph.config().outside_transaction {
            OutsideTransaction::Reject => Err(InvalidState::NoTransaction { node: self.id }.into()),
            OutsideTransaction::AutoWrap => {
                let tx = self.graph.begin_transaction()?;
                self.stage(next());
                tx.commit();
                Ok(())
            }
        }
    }

    fn pending_or_committed(&self) -> T {
        self.graph
            .with_staged(self.id, |write| {
                write
                    .as_any()
                    .downcast_ref::<PendingWrite<T>>()
                    .map(|pending| pending.value.clone())
            })
            .flatten()
            .unwrap_or_else(|| self.cell.value.read().clone())
    }
}

impl<T> Adaptive for ChangeableValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Value = T;

    fn id(&self) -> NodeId {
        self.id
    }

    fn graph(&self) -> &AdaptiveGraph {
        &self.graph
    }

    fn get_value(&self) -> Result<T, AdaptiveError> {
        let _topology = self.graph.read();
        Ok(self.cell.value.read().clone())
    }
}

impl<T> Clone for ChangeableValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            graph: self.graph.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for ChangeableValue<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeableValue")
            .field("id", &self.id)
            .field("graph", &self.graph.id())
            .field("value", &*self.cell.value.read())
            .finish()
    }
}

/// A value that never changes.
pub struct ConstantValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: NodeId,
    graph: AdaptiveGraph,
    value: Arc<T>,
}

impl<T> ConstantValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(id: NodeId, graph: AdaptiveGraph, value: T) -> Self {
        Self {
            id,
            graph,
            value: Arc::new(value),
        }
    }
}

impl<T> Adaptive for ConstantValue<T>
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
        Ok(T::clone(&self.value))
    }
}

impl<T> Clone for ConstantValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            graph: self.graph.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> fmt::Debug for ConstantValue<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstantValue")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}
