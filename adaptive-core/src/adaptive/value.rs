//! The `Adaptive` trait.
//!
//! Every node handle (source, constant, derived) implements [`Adaptive`], so
//! derivations can be built from any of them and chained freely.

use smallvec::smallvec;

use super::derived::{ComputeFn, Derived};
use super::graph::AdaptiveGraph;
use crate::error::AdaptiveError;
use crate::graph::NodeId;

/// A handle to a node holding a value of type [`Adaptive::Value`].
///
/// Handles are cheap to clone and share the node they point to.
pub trait Adaptive: Clone + Send + Sync + 'static {
    /// The type of value this node produces.
    type Value: Clone + Send + Sync + 'static;

    /// The node's ID in its graph.
    fn id(&self) -> NodeId;

    /// The graph this node belongs to.
    fn graph(&self) -> &AdaptiveGraph;

    /// Get the current value, recomputing first if the node is dirty.
    ///
    /// The result is consistent with the most recently committed transaction.
    /// Two reads with no commit in between return the cached value without
    /// running any derivation function.
    fn get_value(&self) -> Result<Self::Value, AdaptiveError>;

    /// Derive a value by applying `f` to this node's value.
    ///
    /// The derived value is computed lazily, on its first read.
    fn map<U, F>(&self, f: F) -> Result<Derived<U>, AdaptiveError>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(Self::Value) -> U + Send + Sync + 'static,
    {
        let input = self.clone();
        self.graph().derive(smallvec![self.id()], move |_| -> ComputeFn<U> {
            Box::new(move || input.get_value().map(&f))
        })
    }

    /// Like [`map`](Adaptive::map), for derivation functions that can fail.
    ///
    /// A failure is reported by [`get_value`](Adaptive::get_value) as
    /// [`AdaptiveError::Recomputation`] and is not cached.
    fn try_map<U, E, F>(&self, f: F) -> Result<Derived<U>, AdaptiveError>
    where
        U: Clone + Send + Sync + 'static,
        E: Into<anyhow::Error> + 'static,
        F: Fn(Self::Value) -> Result<U, E> + Send + Sync + 'static,
    {
        let input = self.clone();
        self.graph().derive(smallvec![self.id()], move |id| -> ComputeFn<U> {
            Box::new(move || {
                let value = input.get_value()?;
                f(value).map_err(|err| AdaptiveError::recomputation(id, err))
            })
        })
    }

    /// Derive a value from this node and `other`.
    fn map2<B, R, F>(&self, other: &B, f: F) -> Result<Derived<R>, AdaptiveError>
    where
        B: Adaptive,
        R: Clone + Send + Sync + 'static,
        F: Fn(Self::Value, B::Value) -> R + Send + Sync + 'static,
    {
        self.graph().ensure_member(other.graph(), other.id())?;

        let a = self.clone();
        let b = other.clone();
        self.graph().derive(smallvec![self.id(), other.id()], move |_| -> ComputeFn<R> {
            Box::new(move || Ok(f(a.get_value()?, b.get_value()?)))
        })
    }

    /// Like [`map2`](Adaptive::map2), for derivation functions that can fail.
    fn try_map2<B, R, E, F>(&self, other: &B, f: F) -> Result<Derived<R>, AdaptiveError>
    where
        B: Adaptive,
        R: Clone + Send + Sync + 'static,
        E: Into<anyhow::Error> + 'static,
        F: Fn(Self::Value, B::Value) -> Result<R, E> + Send + Sync + 'static,
    {
        self.graph().ensure_member(other.graph(), other.id())?;

        let a = self.clone();
        let b = other.clone();
        self.graph().derive(smallvec![self.id(), other.id()], move |id| -> ComputeFn<R> {
            Box::new(move || {
                let (va, vb) = (a.get_value()?, b.get_value()?);
                f(va, vb).map_err(|err| AdaptiveError::recomputation(id, err))
            })
        })
    }
}
