//! Graph Configuration
//!
//! Policies that the adaptive value graph leaves to the caller: what happens
//! when a source is set outside a transaction, what happens when transactions
//! nest, and whether writes of an equal value invalidate dependents.
//!
//! A configuration can be built in code through [`GraphBuilder`] or loaded
//! from JSON:
//!
//! ```rust
//! use adaptive_core::{GraphConfig, OutsideTransaction};
//!
//! let config = GraphConfig::from_json(r#"{ "outside_transaction": "auto_wrap" }"#).unwrap();
//! assert_eq!(config.outside_transaction, OutsideTransaction::AutoWrap);
//! ```

use serde::{Deserialize, Serialize};

use crate::adaptive::AdaptiveGraph;
use crate::error::ConfigError;

/// What `set_value` does when no transaction is open on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutsideTransaction {
    /// Fail with [`InvalidState::NoTransaction`](crate::InvalidState::NoTransaction).
    #[default]
    Reject,

    /// Open a transaction for the single write and commit it immediately.
    AutoWrap,
}

/// What opening a transaction does when one is already open on the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedTransactions {
    /// The inner transaction joins the outer one. Nothing is committed until
    /// the last open transaction on the thread closes.
    #[default]
    Flatten,

    /// Fail with [`InvalidState::NestedTransaction`](crate::InvalidState::NestedTransaction).
    Reject,
}

/// Per-graph policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Behavior of `set_value` with no open transaction.
    pub outside_transaction: OutsideTransaction,

    /// Behavior of nested `begin_transaction` calls.
    pub nested_transactions: NestedTransactions,

    /// When set, committing a value equal to the current one does not
    /// invalidate dependents.
    pub skip_equal_writes: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            outside_transaction: OutsideTransaction::default(),
            nested_transactions: NestedTransactions::default(),
            skip_equal_writes: true,
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`AdaptiveGraph`] with customizable policies.
///
/// # Example
///
/// ```rust
/// use adaptive_core::{AdaptiveGraph, OutsideTransaction};
///
/// let graph = AdaptiveGraph::builder()
///     .outside_transaction(OutsideTransaction::AutoWrap)
///     .build();
/// assert_eq!(graph.config().outside_transaction, OutsideTransaction::AutoWrap);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the policy for writes outside a transaction.
    pub fn outside_transaction(mut self, policy: OutsideTransaction) -> Self {
        self.config.outside_transaction = policy;
        self
    }

    /// Set the policy for nested transactions.
    pub fn nested_transactions(mut self, policy: NestedTransactions) -> Self {
        self.config.nested_transactions = policy;
        self
    }

    /// Enable or disable skipping writes of an equal value.
    pub fn skip_equal_writes(mut self, skip: bool) -> Self {
        self.config.skip_equal_writes = skip;
        self
    }

    /// Build the graph with the configured settings.
    pub fn build(self) -> AdaptiveGraph {
        AdaptiveGraph::with_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict() {
        let config = GraphConfig::default();
        assert_eq!(config.outside_transaction, OutsideTransaction::Reject);
        assert_eq!(config.nested_transactions, NestedTransactions::Flatten);
        assert!(config.skip_equal_writes);
    }

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "outside_transaction": "auto_wrap",
            "nested_transactions": "reject",
            "skip_equal_writes": false
        }"#;

        let config = GraphConfig::from_json(json).unwrap();
        assert_eq!(config.outside_transaction, OutsideTransaction::AutoWrap);
        assert_eq!(config.nested_transactions, NestedTransactions::Reject);
        assert!(!config.skip_equal_writes);
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn parse_rejects_unknown_policy() {
        let err = GraphConfig::from_json(r#"{ "outside_transaction": "sometimes" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_applies_settings() {
        let graph = GraphBuilder::new()
            .nested_transactions(NestedTransactions::Reject)
            .skip_equal_writes(false)
            .build();

        assert_eq!(
            graph.config().nested_transactions,
            NestedTransactions::Reject
        );
        assert!(!graph.config().skip_equal_writes);
    }
}
