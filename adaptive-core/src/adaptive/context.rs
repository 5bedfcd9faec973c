//! Transaction Context
//!
//! The transaction context tracks which graphs have an open transaction on
//! the current thread. Sources consult it to decide whether a write can be
//! staged, and transactions consult it to detect nesting and to find out
//! which guard is the last one to close.
//!
//! # Implementation
//!
//! We use a thread-local stack with one entry per open transaction guard.
//! Opening a transaction pushes the graph's ID; dropping the guard removes
//! that entry again. A graph appearing more than once means the transaction
//! was nested.

use std::cell::RefCell;

use super::graph::GraphId;

thread_local! {
    static TRANSACTION_STACK: RefCell<Vec<GraphId>> = const { RefCell::new(Vec::new()) };
}

/// Guard that removes its stack entry when dropped.
///
/// This keeps the stack consistent even if the transaction body panics.
pub(crate) struct TransactionContext {
    graph: GraphId,
}

impl TransactionContext {
    /// Record an open transaction on `graph` for the current thread.
    pub(crate) fn enter(graph: GraphId) -> Self {
        TRANSACTION_STACK.with(|stack| stack.borrow_mut().push(graph));
        Self { graph }
    }

    /// Check if the current thread has an open transaction on `graph`.
    pub(crate) fn is_open(graph: GraphId) -> bool {
        Self::depth(graph) > 0
    }

    /// Number of open transaction guards on `graph` for the current thread.
    pub(crate) fn depth(graph: GraphId) -> usize {
        TRANSACTION_STACK.with(|stack| stack.borrow().iter().filter(|g| **g == graph).count())
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        TRANSACTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Guards of different graphs may be dropped in any order.
            if let Some(pos) = stack.iter().rposition(|g| *g == self.graph) {
                stack.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_open_graph() {
        let graph = GraphId::new();

        assert!(!TransactionContext::is_open(graph));

        {
            let _ctx = TransactionContext::enter(graph);
            assert!(TransactionContext::is_open(graph));
            assert_eq!(TransactionContext::depth(graph), 1);
        }

        // Context should be cleaned up after drop
        assert!(!TransactionContext::is_open(graph));
    }

    #[test]
    fn nested_contexts_count_depth() {
        let graph = GraphId::new();

        let outer = TransactionContext::enter(graph);
        {
            let _inner = TransactionContext::enter(graph);
            assert_eq!(TransactionContext::depth(graph), 2);
        }
        assert_eq!(TransactionContext::depth(graph), 1);

        drop(outer);
        assert_eq!(TransactionContext::depth(graph), 0);
    }

    #[test]
    fn graphs_are_tracked_independently() {
        let first = GraphId::new();
        let second = GraphId::new();

        let a = TransactionContext::enter(first);
        let b = TransactionContext::enter(second);

        // Out-of-order drop
        drop(a);
        assert!(!TransactionContext::is_open(first));
        assert!(TransactionContext::is_open(second));

        drop(b);
        assert!(!TransactionContext::is_open(second));
    }

    #[test]
    fn context_is_per_thread() {
        let graph = GraphId::new();
        let _ctx = TransactionContext::enter(graph);

        let open_elsewhere = std::thread::spawn(move || TransactionContext::is_open(graph))
            .join()
            .unwrap();
        assert!(!open_elsewhere);
        assert!(TransactionContext::is_open(graph));
    }
}
