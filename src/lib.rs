//! Knodes - batched, data-parallel traversal of a static B+ tree.
//!
//! The tree is built once, then never changes. Because it never changes it
//! can be shared by reference between any number of workers, and a batch of
//! thousands of independent queries can be resolved at once: each query
//! descends from the root to a leaf on its own, writing only its own slots of
//! the batch's output arrays. No query waits on another, and the result of a
//! query does not depend on what else was in its batch.
//!
//! The pieces, from the bottom up:
//!
//! * [`store`] - the node arena ([`NodeStore`]), the records its leaves own,
//!   and the [`Tree`] that ties them together. Nodes refer to each other by
//!   index, the root is node `0`. [`TreeBuilder`] bulk loads a balanced tree
//!   from sorted records, [`Tree::from_parts`] verifies one built elsewhere.
//! * [`kernel`] - the per-query descent and the two kernels on top of it. A
//!   point query finds the record with an exact key. A range query runs a
//!   lower and an upper bound descent and yields a contiguous record span.
//! * [`Executor`] - splits a batch into disjoint chunks and resolves them on
//!   scoped worker threads.
//! * [`PointBatch`] / [`RangeBatch`] - owned per-query arrays for callers
//!   who do not manage their own.
//!
//! ```
//! use knodes::{Executor, RangeBatch, Record, TreeBuilder};
//!
//! let tree = TreeBuilder::new(3)
//!     .build((1..=7u32).map(|k| Record::new(k, k * 10)).collect())
//!     .unwrap();
//! assert_eq!(tree.maxheight(), 2);
//!
//! assert_eq!(tree.get(&4).map(|r| r.value), Some(40));
//! assert!(tree.get(&99).is_none());
//!
//! let mut batch = RangeBatch::new(&tree, vec![(3, 5), (8, 10)]);
//! batch.run(&Executor::default(), &tree).unwrap();
//! assert_eq!(batch.reclength(), &[3, 0]);
//! ```
//!
//! # Features
//!
//! * `threaded` - resolve chunks on scoped threads. Without it chunks are
//!   resolved one after another on the calling thread. Enabled by default.
//! * `serde` - serialize records and nodes.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![allow(clippy::needless_lifetimes)]

pub mod batch;
pub mod error;
pub mod exec;
pub mod kernel;
pub mod store;

mod utils;

pub use batch::{PointBatch, RangeBatch};
pub use error::{BatchError, Result, TreeError};
pub use exec::{BatchReport, Executor, ExecutorBuilder};
pub use kernel::{PointSlots, RangeSlots};
pub use store::{KNode, Link, NodeId, NodeStore, Record, Tree, TreeBuilder, ROOT};

/// The order [`TreeBuilder::default`] builds with. Nodes of this order keep
/// their keys and children inline.
pub const DEFAULT_ORDER: usize = store::NODE_INLINE;
