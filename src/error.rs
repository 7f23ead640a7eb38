//! Error types for tree construction and batch setup.
//!
//! None of these are produced by the traversal kernels themselves. A missing
//! key or an empty range is a normal query outcome, and kernel preconditions
//! are only `debug_assert!`ed. These errors come from the orchestrator-side
//! constructors that validate a tree or a batch before dispatch.

use thiserror::Error;

use crate::store::NodeId;

/// Result type alias using [`TreeError`].
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

/// A node store or record array that does not form a valid static tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The requested order is below the minimum branching factor.
    #[error("order {order} is too small (minimum {min})")]
    InvalidOrder {
        /// Requested order.
        order: usize,
        /// Smallest accepted order.
        min: usize,
    },

    /// Bulk load input is unsorted or holds a duplicate key.
    #[error("record keys are not strictly ascending at position {position}")]
    UnsortedRecords {
        /// Index of the first record not greater than its predecessor.
        position: usize,
    },

    /// No nodes at all.
    #[error("node store is empty, a tree needs at least a root")]
    EmptyStore,

    /// A branch names a child index past the end of the store.
    #[error("node {node} references child {child} outside the store ({elem} nodes)")]
    ChildOutOfBounds {
        /// The branch.
        node: NodeId,
        /// The missing child.
        child: NodeId,
        /// Nodes in the store.
        elem: usize,
    },

    /// A node holds more keys than the order permits.
    #[error("node {node} holds {keys} keys, order {order} allows at most {max}")]
    TooManyKeys {
        /// The overfull node.
        node: NodeId,
        /// Keys it holds.
        keys: usize,
        /// Order of the tree.
        order: usize,
        /// Keys allowed per node.
        max: usize,
    },

    /// A branch does not have exactly one more child than keys.
    #[error("branch {node} has {children} children for {keys} keys")]
    ChildCount {
        /// The branch.
        node: NodeId,
        /// Keys it holds.
        keys: usize,
        /// Children it links to.
        children: usize,
    },

    /// Keys within one node are out of order.
    #[error("keys of node {node} are not strictly ascending")]
    UnsortedNode {
        /// The offending node.
        node: NodeId,
    },

    /// A key lies outside the separators that route to its node.
    #[error("keys of node {node} fall outside the range its parent assigns it")]
    KeyOutOfRange {
        /// The offending node.
        node: NodeId,
    },

    /// Leaves sit at different depths.
    #[error("leaf {node} sits at depth {depth}, expected {expected}")]
    Unbalanced {
        /// The leaf.
        node: NodeId,
        /// Its depth.
        depth: usize,
        /// Depth of the first leaf reached.
        expected: usize,
    },

    /// Leaves in key order do not own consecutive record spans.
    #[error("leaf {node} owns records starting at {start}, expected {expected}")]
    LeafGap {
        /// The leaf.
        node: NodeId,
        /// Its first record.
        start: usize,
        /// Where the previous leaf ended.
        expected: usize,
    },

    /// A leaf's keys differ from the keys of its records, or from its count.
    #[error("leaf {node} keys do not match the records it owns")]
    LeafKeys {
        /// The leaf.
        node: NodeId,
    },

    /// Leaves do not cover the record array exactly.
    #[error("leaves cover {covered} records, the record array holds {records}")]
    RecordCoverage {
        /// Records the leaves claim.
        covered: usize,
        /// Records present.
        records: usize,
    },

    /// Two links lead to the same node.
    #[error("node {node} is reachable more than once")]
    SharedNode {
        /// The shared node.
        node: NodeId,
    },
}

/// A batch whose arrays do not fit the query count or the tree height.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// A per-query array has the wrong length.
    #[error("{array} holds {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the array.
        array: &'static str,
        /// Length the batch needs.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// The path arrays were sized for a tree of another height.
    #[error("batch was sized for height {batch}, tree has height {tree}")]
    HeightMismatch {
        /// Height the batch was sized for.
        batch: usize,
        /// Height of the tree.
        tree: usize,
    },
}

impl BatchError {
    pub(crate) fn check_len(array: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(BatchError::LengthMismatch {
                array,
                expected,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = TreeError::LeafKeys { node: 2 };
        assert_eq!(e.to_string(), "leaf 2 keys do not match the records it owns");
        assert_eq!(
            BatchError::check_len("offset", 6, 4).unwrap_err().to_string(),
            "offset holds 4 entries, expected 6"
        );
        assert_eq!(BatchError::check_len("offset", 6, 6), Ok(()));
    }
}
