//! Orchestrator-side batches that own their per-query arrays.
//!
//! A batch is sized once, from its inputs and the height of the tree it
//! will run against, and can be re-run any number of times. Each run
//! overwrites every output and scratch slot.

use std::ops::Range;
use std::slice;

use crate::error::BatchError;
use crate::exec::{BatchReport, Executor};
use crate::kernel::{range_chunk, resolve, ExactMatch, PointSlots, RangeSlots};
use crate::store::{NodeId, Record, Tree};

/// A batch of point queries.
#[derive(Debug, Clone)]
pub struct PointBatch<K, V> {
    maxheight: usize,
    keys: Vec<K>,
    curr_knode: Vec<NodeId>,
    offset: Vec<u32>,
    ans: Vec<Option<Record<K, V>>>,
}

impl<K, V> PointBatch<K, V>
where
    K: Ord + Copy + Send + Sync,
    V: Clone + Send + Sync,
{
    /// Allocate a batch for `keys` sized for `tree`.
    pub fn new(tree: &Tree<K, V>, keys: Vec<K>) -> Self {
        Self::with_height(tree.maxheight(), keys)
    }

    /// Allocate a batch for `keys` sized for a tree of height `maxheight`.
    pub fn with_height(maxheight: usize, keys: Vec<K>) -> Self {
        let count = keys.len();
        PointBatch {
            maxheight,
            curr_knode: vec![0; count * maxheight],
            offset: vec![0; count * maxheight],
            ans: vec![None; count],
            keys,
        }
    }

    /// Resolve every query against `tree`.
    pub fn run(&mut self, exec: &Executor, tree: &Tree<K, V>) -> Result<BatchReport, BatchError> {
        if self.maxheight != tree.maxheight() {
            return Err(BatchError::HeightMismatch {
                batch: self.maxheight,
                tree: tree.maxheight(),
            });
        }
        let slots = PointSlots::new(
            self.maxheight,
            &self.keys,
            &mut self.curr_knode,
            &mut self.offset,
            &mut self.ans,
        )?;
        Ok(exec.point(tree, slots))
    }

    /// Number of queries.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// The query keys.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// One answer per query, `None` where the key is absent.
    pub fn answers(&self) -> &[Option<Record<K, V>>] {
        &self.ans
    }

    /// The answer to query `q`.
    pub fn answer(&self, q: usize) -> Option<&Record<K, V>> {
        self.ans.get(q).and_then(Option::as_ref)
    }

    /// Nodes reached and child slots taken by query `q`, one entry per level.
    pub fn path(&self, q: usize) -> (&[NodeId], &[u32]) {
        let at = q * self.maxheight..(q + 1) * self.maxheight;
        (&self.curr_knode[at.clone()], &self.offset[at])
    }

    /// Give up the batch, keeping the answers.
    pub fn into_answers(self) -> Vec<Option<Record<K, V>>> {
        self.ans
    }
}

/// A batch of inclusive range queries.
#[derive(Debug, Clone)]
pub struct RangeBatch<K> {
    maxheight: usize,
    start: Vec<K>,
    end: Vec<K>,
    curr_knode: Vec<NodeId>,
    offset: Vec<u32>,
    last_knode: Vec<NodeId>,
    offset_2: Vec<u32>,
    recstart: Vec<usize>,
    reclength: Vec<usize>,
}

impl<K> RangeBatch<K>
where
    K: Ord + Copy + Send + Sync,
{
    /// Allocate a batch of `(start, end)` ranges sized for `tree`.
    pub fn new<V, I>(tree: &Tree<K, V>, ranges: I) -> Self
    where
        I: IntoIterator<Item = (K, K)>,
    {
        Self::with_height(tree.maxheight(), ranges)
    }

    /// Allocate a batch of `(start, end)` ranges for a tree of height
    /// `maxheight`.
    pub fn with_height<I>(maxheight: usize, ranges: I) -> Self
    where
        I: IntoIterator<Item = (K, K)>,
    {
        let (start, end): (Vec<K>, Vec<K>) = ranges.into_iter().unzip();
        let count = start.len();
        RangeBatch {
            maxheight,
            start,
            end,
            curr_knode: vec![0; count * maxheight],
            offset: vec![0; count * maxheight],
            last_knode: vec![0; count * maxheight],
            offset_2: vec![0; count * maxheight],
            recstart: vec![0; count],
            reclength: vec![0; count],
        }
    }

    /// Resolve every query against `tree`.
    pub fn run<V>(&mut self, exec: &Executor, tree: &Tree<K, V>) -> Result<BatchReport, BatchError> {
        if self.maxheight != tree.maxheight() {
            return Err(BatchError::HeightMismatch {
                batch: self.maxheight,
                tree: tree.maxheight(),
            });
        }
        let slots = RangeSlots::new(
            self.maxheight,
            &self.start,
            &self.end,
            &mut self.curr_knode,
            &mut self.offset,
            &mut self.last_knode,
            &mut self.offset_2,
            &mut self.recstart,
            &mut self.reclength,
        )?;
        Ok(exec.range(tree, slots))
    }

    /// Number of queries.
    pub fn count(&self) -> usize {
        self.start.len()
    }

    /// Index of the first matching record per query, or the insertion point
    /// of its start key when nothing matches.
    pub fn recstart(&self) -> &[usize] {
        &self.recstart
    }

    /// Number of matching records per query.
    pub fn reclength(&self) -> &[usize] {
        &self.reclength
    }

    /// Record positions matched by query `q`.
    pub fn span(&self, q: usize) -> Range<usize> {
        self.recstart[q]..self.recstart[q] + self.reclength[q]
    }

    /// The records matched by query `q`.
    pub fn records<'t, V>(&self, q: usize, tree: &'t Tree<K, V>) -> &'t [Record<K, V>] {
        &tree.records()[self.span(q)]
    }

    /// Lower bound descent of query `q`: nodes reached and slots taken.
    pub fn path(&self, q: usize) -> (&[NodeId], &[u32]) {
        let at = q * self.maxheight..(q + 1) * self.maxheight;
        (&self.curr_knode[at.clone()], &self.offset[at])
    }

    /// Upper bound descent of query `q`: nodes reached and slots taken.
    pub fn upper_path(&self, q: usize) -> (&[NodeId], &[u32]) {
        let at = q * self.maxheight..(q + 1) * self.maxheight;
        (&self.last_knode[at.clone()], &self.offset_2[at])
    }
}

impl<K, V> Tree<K, V>
where
    K: Ord + Copy,
{
    /// Look up one key, as a batch of one resolved on the calling thread.
    pub fn get(&self, key: &K) -> Option<&Record<K, V>> {
        let h = self.maxheight();
        let (mut curr, mut off) = (vec![0; h], vec![0; h]);
        let mut found = None;
        resolve::<K, ExactMatch, _>(
            self.store(),
            h,
            slice::from_ref(key),
            &mut curr,
            &mut off,
            |_, hit| found = hit,
        );
        found.map(|idx| &self.records()[idx])
    }

    /// Record positions with keys in `start..=end`, as a batch of one
    /// resolved on the calling thread.
    pub fn span(&self, start: K, end: K) -> Range<usize> {
        let h = self.maxheight();
        let (mut c, mut o, mut l, mut p) = (vec![0; h], vec![0; h], vec![0; h], vec![0; h]);
        let (mut rs, mut rl) = ([0], [0]);
        let (starts, ends) = ([start], [end]);
        let slots = RangeSlots::new_unchecked(
            h,
            &starts,
            &ends,
            &mut c,
            &mut o,
            &mut l,
            &mut p,
            &mut rs,
            &mut rl,
        );
        range_chunk(self.store(), h, slots);
        rs[0]..rs[0] + rl[0]
    }

    /// Records with keys in `start..=end`.
    pub fn range(&self, start: K, end: K) -> &[Record<K, V>] {
        &self.records()[self.span(start, end)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TreeBuilder;

    // order 3, keys 1..=7, two levels below the root.
    fn tree() -> Tree<u32, u32> {
        let recs = (1..=7).map(|k| Record::new(k, k * 11)).collect();
        TreeBuilder::new(3).build(recs).unwrap()
    }

    #[test]
    fn test_worked_example() {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = tree();
        assert_eq!(tree.order(), 3);
        assert_eq!(tree.maxheight(), 2);
        let exec = Executor::default();

        let mut points = PointBatch::new(&tree, vec![4, 99]);
        let report = points.run(&exec, &tree).unwrap();
        assert_eq!(report.hits, 1);
        assert_eq!(points.answer(0), Some(&Record::new(4, 44)));
        assert_eq!(points.answer(1), None);

        let mut ranges = RangeBatch::new(&tree, vec![(3, 5), (8, 10)]);
        ranges.run(&exec, &tree).unwrap();
        assert_eq!(ranges.reclength(), &[3, 0]);
        let keys: Vec<u32> = ranges.records(0, &tree).iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![3, 4, 5]);
        assert!(ranges.records(1, &tree).is_empty());
        assert_eq!(ranges.recstart()[1], 7);
    }

    #[test]
    fn test_paths_have_maxheight_entries() {
        let tree = tree();
        let exec = Executor::sequential();
        let mut points = PointBatch::new(&tree, (0..10).collect());
        points.run(&exec, &tree).unwrap();
        for q in 0..points.count() {
            let (nodes, slots) = points.path(q);
            assert_eq!(nodes.len(), tree.maxheight());
            assert_eq!(slots.len(), tree.maxheight());
            assert!(tree.store().get(nodes[nodes.len() - 1]).is_leaf());
        }

        let mut ranges = RangeBatch::new(&tree, vec![(2, 6)]);
        ranges.run(&exec, &tree).unwrap();
        assert_eq!(ranges.path(0).0.len(), 2);
        assert_eq!(ranges.upper_path(0).0.len(), 2);
        assert_ne!(ranges.path(0).0, ranges.upper_path(0).0);
    }

    #[test]
    fn test_height_mismatch() {
        let tree = tree();
        let exec = Executor::sequential();
        let mut points: PointBatch<u32, u32> = PointBatch::with_height(1, vec![1]);
        assert_eq!(
            points.run(&exec, &tree).unwrap_err(),
            BatchError::HeightMismatch { batch: 1, tree: 2 }
        );
        let mut ranges = RangeBatch::with_height(3, vec![(1u32, 2u32)]);
        assert!(matches!(
            ranges.run(&exec, &tree),
            Err(BatchError::HeightMismatch { batch: 3, tree: 2 })
        ));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let tree = tree();
        let exec = Executor::default();
        let mut points = PointBatch::new(&tree, vec![7, 3, 3, 0, 8]);
        points.run(&exec, &tree).unwrap();
        let first = points.clone();
        points.run(&exec, &tree).unwrap();
        assert_eq!(points.answers(), first.answers());
        assert_eq!(points.path(2), first.path(2));
        assert_eq!(points.into_answers().len(), 5);
    }

    #[test]
    fn test_tree_single_queries() {
        let tree = tree();
        assert_eq!(tree.get(&6), Some(&Record::new(6, 66)));
        assert_eq!(tree.get(&0), None);
        assert_eq!(tree.span(3, 5), 2..5);
        assert_eq!(tree.range(5, 100).len(), 3);
        assert_eq!(tree.span(8, 10), 7..7);
        assert_eq!(tree.span(5, 3), 4..4);

        let leaf = TreeBuilder::new(4)
            .build(vec![Record::new(2u32, ()), Record::new(4, ())])
            .unwrap();
        assert_eq!(leaf.maxheight(), 0);
        assert_eq!(leaf.span(1, 2), 0..1);
        assert_eq!(leaf.span(3, 9), 1..2);
        assert_eq!(leaf.span(5, 9), 2..2);
    }

    // Keys only need ordering, never formatting.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Opaque(u32);

    #[test]
    fn test_keys_without_debug() {
        let recs = (1..=20).map(|k| Record::new(Opaque(k), k)).collect();
        let tree = TreeBuilder::new(3).build(recs).unwrap();
        let exec = Executor::default();

        let mut points = PointBatch::new(&tree, vec![Opaque(7), Opaque(21)]);
        assert_eq!(points.run(&exec, &tree).unwrap().hits, 1);
        assert_eq!(points.answer(0).map(|r| r.value), Some(7));
        assert!(points.answer(1).is_none());
        assert_eq!(points.keys()[1].0, 21);

        let mut ranges = RangeBatch::new(&tree, vec![(Opaque(5), Opaque(9))]);
        ranges.run(&exec, &tree).unwrap();
        assert_eq!(ranges.reclength(), &[5]);
        assert_eq!(tree.span(Opaque(0), Opaque(3)), 0..3);
    }
}
