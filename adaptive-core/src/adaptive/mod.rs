//! Adaptive Values
//!
//! This module implements the user-facing side of the graph: sources,
//! constants, derived values and the transactions that change them.
//!
//! # Concepts
//!
//! ## Sources
//!
//! A [`ChangeableValue`] holds a value that the application sets. Sets are
//! staged inside a [`Transaction`] and become visible together on commit.
//!
//! ## Derived Values
//!
//! A [`Derived`] value is a pure function of its inputs. It is computed on
//! first read, cached, and recomputed only after a committed change upstream
//! has marked it dirty.
//!
//! ## Transactions
//!
//! A transaction groups writes. Commit applies the writes and marks every
//! node downstream of a changed source as dirty. Nothing is recomputed at
//! commit time.
//!
//! # Implementation Notes
//!
//! Dependencies are declared when a derived value is created, not
//! discovered while it runs. The inputs of a node never change, so the graph
//! structure only grows and the dirty traversal never needs to re-check
//! edges.

mod context;
mod derived;
mod graph;
mod source;
mod transaction;
mod value;

pub use derived::Derived;
pub use graph::{AdaptiveGraph, GraphId};
pub use source::{ChangeableValue, ConstantValue};
pub use transaction::{CommitSummary, Transaction};
pub use value::Adaptive;
