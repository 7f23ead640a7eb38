//! Data-parallel execution of a query batch.
//!
//! An [`Executor`] splits every query-indexed array of a batch at the same
//! query boundaries into disjoint chunks and resolves each chunk on its own
//! worker. Workers share the tree by reference and never touch another
//! chunk's slots, so there is nothing to lock. The call returns once every
//! chunk has been resolved.
//!
//! ```
//! use knodes::{ExecutorBuilder, PointBatch, Record, TreeBuilder};
//!
//! let records = (0..1000u32).map(|k| Record::new(k * 2, k));
//! let tree = TreeBuilder::new(16).build(records.collect()).unwrap();
//!
//! let exec = ExecutorBuilder::default()
//!     .set_workers(4)
//!     .set_min_chunk(64)
//!     .build()
//!     .expect("invalid executor parameters");
//!
//! let mut batch = PointBatch::new(&tree, (0..2000).collect());
//! let report = batch.run(&exec, &tree).unwrap();
//! assert_eq!(report.hits, 1000);
//! assert_eq!(batch.answer(10).map(|r| r.value), Some(5));
//! ```

use std::num::NonZeroUsize;
use tracing::debug;

#[cfg(feature = "threaded")]
use crossbeam_utils::thread;
#[cfg(feature = "threaded")]
use std::panic;
#[cfg(feature = "threaded")]
use tracing::trace;

use crate::kernel::{point_chunk, range_chunk, PointSlots, RangeSlots};
use crate::store::{NodeStore, Tree};

/// Smallest number of queries worth handing to a worker by default.
pub const DEFAULT_MIN_CHUNK: usize = 1024;

/// What a completed batch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Queries resolved.
    pub queries: usize,
    /// Chunks the batch was split into, one per worker.
    pub workers: usize,
    /// Point batches: keys found. Range batches: records matched in total.
    pub hits: usize,
}

/// Slot bundles a batch can be split into per-worker chunks.
pub(crate) trait Partition: Sized {
    fn count(&self) -> usize;
    fn split_at(self, mid: usize, height: usize) -> (Self, Self);
}

impl<K, V> Partition for PointSlots<'_, K, V> {
    fn count(&self) -> usize {
        PointSlots::count(self)
    }

    fn split_at(self, mid: usize, height: usize) -> (Self, Self) {
        PointSlots::split_at(self, mid, height)
    }
}

impl<K> Partition for RangeSlots<'_, K> {
    fn count(&self) -> usize {
        RangeSlots::count(self)
    }

    fn split_at(self, mid: usize, height: usize) -> (Self, Self) {
        RangeSlots::split_at(self, mid, height)
    }
}

/// Configuration for an [`Executor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorBuilder {
    workers: Option<usize>,
    min_chunk: Option<usize>,
}

impl ExecutorBuilder {
    /// The most workers a batch is spread over. Defaults to the available
    /// parallelism of the host.
    pub fn set_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// The fewest queries a worker is given, so small batches are not split
    /// finer than is worth a thread. Defaults to [`DEFAULT_MIN_CHUNK`].
    pub fn set_min_chunk(mut self, min_chunk: usize) -> Self {
        self.min_chunk = Some(min_chunk);
        self
    }

    /// Consume this builder. Returns `None` if either value is zero.
    pub fn build(self) -> Option<Executor> {
        let ExecutorBuilder { workers, min_chunk } = self;
        let workers = workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        let min_chunk = min_chunk.unwrap_or(DEFAULT_MIN_CHUNK);
        if workers == 0 || min_chunk == 0 {
            return None;
        }
        Some(Executor { workers, min_chunk })
    }
}

/// Runs the traversal kernels over whole batches.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    workers: usize,
    min_chunk: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Executor {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            min_chunk: DEFAULT_MIN_CHUNK,
        }
    }
}

impl Executor {
    /// An executor that resolves every batch on the calling thread.
    pub fn sequential() -> Self {
        Executor {
            workers: 1,
            min_chunk: DEFAULT_MIN_CHUNK,
        }
    }

    /// Configured worker limit.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Configured minimum chunk size.
    pub fn min_chunk(&self) -> usize {
        self.min_chunk
    }

    /// Resolve a point-query batch against `tree`.
    pub fn point<K, V>(&self, tree: &Tree<K, V>, slots: PointSlots<'_, K, V>) -> BatchReport
    where
        K: Ord + Copy + Send + Sync,
        V: Clone + Send + Sync,
    {
        let queries = slots.count();
        let (workers, hits) = self.dispatch(slots, tree.maxheight(), |chunk| {
            point_chunk(tree, chunk)
        });
        debug!(queries, workers, hits, "point batch complete");
        BatchReport {
            queries,
            workers,
            hits,
        }
    }

    /// Resolve a range-query batch against `tree`.
    pub fn range<K, V>(&self, tree: &Tree<K, V>, slots: RangeSlots<'_, K>) -> BatchReport
    where
        K: Ord + Copy + Send + Sync,
    {
        self.range_nodes(tree.store(), tree.maxheight(), slots)
    }

    /// Resolve a range-query batch from the node store alone. Record
    /// positions in the output refer to the record array the store's leaves
    /// were built over.
    pub fn range_nodes<K>(
        &self,
        store: &NodeStore<K>,
        maxheight: usize,
        slots: RangeSlots<'_, K>,
    ) -> BatchReport
    where
        K: Ord + Copy + Send + Sync,
    {
        let queries = slots.count();
        let (workers, hits) = self.dispatch(slots, maxheight, |chunk| {
            range_chunk(store, maxheight, chunk)
        });
        debug!(queries, workers, hits, "range batch complete");
        BatchReport {
            queries,
            workers,
            hits,
        }
    }

    fn chunk_len(&self, count: usize) -> usize {
        count.div_ceil(self.workers).max(self.min_chunk)
    }

    // Returns the number of chunks and the summed kernel results.
    fn dispatch<S, F>(&self, slots: S, height: usize, kernel: F) -> (usize, usize)
    where
        S: Partition + Send,
        F: Fn(S) -> usize + Sync,
    {
        let count = slots.count();
        let chunk = self.chunk_len(count);
        let pieces = count.div_ceil(chunk).max(1);
        if pieces == 1 {
            return (1, kernel(slots));
        }
        (pieces, run_chunks(slots, chunk, height, &kernel))
    }
}

#[cfg(feature = "threaded")]
fn run_chunks<S, F>(slots: S, chunk: usize, height: usize, kernel: &F) -> usize
where
    S: Partition + Send,
    F: Fn(S) -> usize + Sync,
{
    let r = thread::scope(|scope| {
        let mut handles = Vec::new();
        let mut rest = slots;
        while rest.count() > chunk {
            let (head, tail) = rest.split_at(chunk, height);
            trace!(queries = head.count(), "dispatching chunk");
            handles.push(scope.spawn(move |_| kernel(head)));
            rest = tail;
        }
        // The calling thread takes the last chunk itself.
        let mut total = kernel(rest);
        for handle in handles {
            match handle.join() {
                Ok(hits) => total += hits,
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        total
    });
    match r {
        Ok(total) => total,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(not(feature = "threaded"))]
fn run_chunks<S, F>(slots: S, chunk: usize, height: usize, kernel: &F) -> usize
where
    S: Partition + Send,
    F: Fn(S) -> usize + Sync,
{
    let mut total = 0;
    let mut rest = slots;
    while rest.count() > chunk {
        let (head, tail) = rest.split_at(chunk, height);
        total += kernel(head);
        rest = tail;
    }
    total + kernel(rest)
}
