//! The traversal kernels.
//!
//! Both kernels are built on one primitive, [`resolve`]: a level-synchronous
//! descent of every query in a chunk from the root to its leaf, followed by a
//! leaf probe chosen by a [`LeafProbe`] policy. The point kernel probes for an
//! exact match, the range kernel runs the primitive twice, once for the lower
//! bound and once for the upper bound.
//!
//! Nothing here allocates, locks or validates. Slot arrays are checked when
//! the [`PointSlots`] / [`RangeSlots`] are constructed, and the executor only
//! ever hands a kernel a disjoint chunk of them.

mod point;
mod range;

pub use point::PointSlots;
pub use range::RangeSlots;

pub(crate) use point::point_chunk;
pub(crate) use range::range_chunk;

use crate::store::{KNode, NodeId, NodeStore, ROOT};
use crate::utils::{slice_lower_bound, slice_search_linear, slice_upper_bound};

/// What a descent looks for once it reaches its leaf.
pub trait LeafProbe<K> {
    /// The per-query result of the probe.
    type Hit;

    /// Probe `leaf` for `key`. Positions are absolute record indices.
    fn probe(leaf: &KNode<K>, key: &K) -> Self::Hit;
}

/// The record whose key equals the query key, if any.
#[derive(Debug)]
pub struct ExactMatch;

/// The first record whose key is `>=` the query key. Where every key in
/// the leaf is smaller this is one past the leaf, which is the first record
/// of the next leaf.
#[derive(Debug)]
pub struct LowerBound;

/// One past the last record whose key is `<=` the query key.
#[derive(Debug)]
pub struct UpperBound;

#[inline(always)]
fn leaf_base<K: Ord + Copy>(leaf: &KNode<K>) -> usize {
    debug_assert!(leaf.is_leaf());
    leaf.records().map_or(0, |r| r.start)
}

impl<K: Ord + Copy> LeafProbe<K> for ExactMatch {
    type Hit = Option<usize>;

    #[inline(always)]
    fn probe(leaf: &KNode<K>, key: &K) -> Option<usize> {
        slice_search_linear(leaf.keys(), key)
            .ok()
            .map(|idx| leaf_base(leaf) + idx)
    }
}

impl<K: Ord + Copy> LeafProbe<K> for LowerBound {
    type Hit = usize;

    #[inline(always)]
    fn probe(leaf: &KNode<K>, key: &K) -> usize {
        leaf_base(leaf) + slice_lower_bound(leaf.keys(), key)
    }
}

impl<K: Ord + Copy> LeafProbe<K> for UpperBound {
    type Hit = usize;

    #[inline(always)]
    fn probe(leaf: &KNode<K>, key: &K) -> usize {
        leaf_base(leaf) + slice_upper_bound(leaf.keys(), key)
    }
}

/// Descend every query in `keys` for `height` levels, recording the path.
///
/// The outer loop is the level, so at level `L` every query reads a level `L`
/// node and writes its level `L` scratch entry. For query `q`,
/// `curr_knode[q * height + L]` is the node reached by step `L` and
/// `offset[q * height + L]` the child slot taken to get there.
pub(crate) fn descend<K: Ord + Copy>(
    store: &NodeStore<K>,
    height: usize,
    keys: &[K],
    curr_knode: &mut [NodeId],
    offset: &mut [u32],
) {
    debug_assert_eq!(curr_knode.len(), keys.len() * height);
    debug_assert_eq!(offset.len(), keys.len() * height);
    for level in 0..height {
        for (q, key) in keys.iter().enumerate() {
            let at = q * height + level;
            let node = if level == 0 { ROOT } else { curr_knode[at - 1] };
            let (slot, child) = store.get(node).step(key);
            curr_knode[at] = child;
            offset[at] = slot as u32;
        }
    }
}

/// The leaf query `q` ended on.
#[inline(always)]
pub(crate) fn terminal(curr_knode: &[NodeId], height: usize, q: usize) -> NodeId {
    if height == 0 {
        ROOT
    } else {
        curr_knode[q * height + height - 1]
    }
}

/// Descend, then probe each query's leaf with `P` and hand the hit to `sink`.
pub(crate) fn resolve<K, P, F>(
    store: &NodeStore<K>,
    height: usize,
    keys: &[K],
    curr_knode: &mut [NodeId],
    offset: &mut [u32],
    mut sink: F,
) where
    K: Ord + Copy,
    P: LeafProbe<K>,
    F: FnMut(usize, P::Hit),
{
    descend(store, height, keys, curr_knode, offset);
    for (q, key) in keys.iter().enumerate() {
        let leaf = store.get(terminal(curr_knode, height, q));
        sink(q, P::probe(leaf, key));
    }
}
