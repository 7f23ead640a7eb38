//! The node store: a flat, index-linked arena of tree nodes and the record
//! array its leaves own.
//!
//! Nodes never hold owning pointers. Internal nodes name their children by
//! [`NodeId`], leaves name a contiguous slice of the record array by start
//! and count. The root is always node `0`. Once a [`Tree`] has been built or
//! verified it is immutable, which is what lets any number of traversals
//! share it by reference.

mod build;

pub use build::TreeBuilder;

use smallvec::SmallVec;
use std::mem::size_of;
use std::ops::Range;

use crate::error::{Result, TreeError};
use crate::utils::slice_upper_bound;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a node in the store.
pub type NodeId = u32;

/// The root is node zero by convention.
pub const ROOT: NodeId = 0;

/// The smallest branching factor a tree may have.
pub const MIN_ORDER: usize = 3;

/// The node arena reserves capacity in multiples of this many nodes.
pub const NODE_ALIGN: usize = 32;

/// Keys and children up to this count stay inline in the node.
pub(crate) const NODE_INLINE: usize = 8;

/// A payload identified by its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record<K, V> {
    /// The key records are ordered by.
    pub key: K,
    /// The opaque payload.
    pub value: V,
}

impl<K, V> Record<K, V> {
    /// Pair a key with its payload.
    pub fn new(key: K, value: V) -> Self {
        Record { key, value }
    }
}

impl<K, V> From<(K, V)> for Record<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Record { key, value }
    }
}

/// Where a node leads: to child nodes, or to the records it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Link {
    /// An internal node. Always one more child than the node has keys.
    Branch(SmallVec<[NodeId; NODE_INLINE]>),
    /// A leaf owning `records[start..start + count]`.
    Leaf {
        /// First owned record.
        start: usize,
        /// Number of owned records.
        count: usize,
    },
}

/// One node of the tree.
///
/// A leaf's keys are the keys of the records it owns, so a leaf can be
/// searched without touching the record array.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KNode<K> {
    keys: SmallVec<[K; NODE_INLINE]>,
    link: Link,
}

impl<K: Ord + Copy> KNode<K> {
    /// Build an internal node. `children` must hold one more entry than `keys`.
    pub fn branch<I, C>(keys: I, children: C) -> Self
    where
        I: IntoIterator<Item = K>,
        C: IntoIterator<Item = NodeId>,
    {
        KNode {
            keys: keys.into_iter().collect(),
            link: Link::Branch(children.into_iter().collect()),
        }
    }

    /// Build a leaf owning `count` records from `start`, with their keys.
    pub fn leaf<I>(keys: I, start: usize) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let keys: SmallVec<[K; NODE_INLINE]> = keys.into_iter().collect();
        let count = keys.len();
        KNode {
            keys,
            link: Link::Leaf { start, count },
        }
    }

    /// The discriminator keys (or, for a leaf, the owned record keys).
    #[inline(always)]
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// The node's link.
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// True for leaves.
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        matches!(self.link, Link::Leaf { .. })
    }

    /// Child indices of an internal node, `None` for a leaf.
    #[inline(always)]
    pub fn children(&self) -> Option<&[NodeId]> {
        match &self.link {
            Link::Branch(children) => Some(children),
            Link::Leaf { .. } => None,
        }
    }

    /// The slice of the record array a leaf owns, `None` for an internal node.
    #[inline(always)]
    pub fn records(&self) -> Option<Range<usize>> {
        match self.link {
            Link::Leaf { start, count } => Some(start..start + count),
            Link::Branch(_) => None,
        }
    }

    /// The child slot a descent for `k` takes: the position of the first key
    /// strictly greater than `k`, or the last child if there is none.
    #[inline(always)]
    pub fn child_slot(&self, k: &K) -> usize {
        slice_upper_bound(&self.keys, k)
    }

    /// Slot and index of the child a descent for `k` moves to.
    #[inline(always)]
    pub(crate) fn step(&self, k: &K) -> (usize, NodeId) {
        debug_assert!(!self.is_leaf());
        let slot = self.child_slot(k);
        match &self.link {
            Link::Branch(children) => (slot, children[slot]),
            // Descending through a leaf means maxheight disagrees with the tree.
            Link::Leaf { .. } => unreachable!("descent stepped through a leaf"),
        }
    }
}

/// The flat node array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStore<K> {
    nodes: Vec<KNode<K>>,
}

impl<K: Ord + Copy> NodeStore<K> {
    /// Take ownership of a node array. Capacity is rounded up to a multiple of
    /// [`NODE_ALIGN`] nodes.
    pub fn new(mut nodes: Vec<KNode<K>>) -> Self {
        let want = nodes.len().div_ceil(NODE_ALIGN).max(1) * NODE_ALIGN;
        nodes.reserve_exact(want.saturating_sub(nodes.len()));
        NodeStore { nodes }
    }

    /// The node at `id`. Valid ids are `0..knodes_elem()`.
    #[inline(always)]
    pub fn get(&self, id: NodeId) -> &KNode<K> {
        debug_assert!((id as usize) < self.nodes.len());
        &self.nodes[id as usize]
    }

    /// The root node.
    pub fn root(&self) -> &KNode<K> {
        self.get(ROOT)
    }

    /// Logical node count.
    pub fn knodes_elem(&self) -> usize {
        self.nodes.len()
    }

    /// Size in bytes of the backing allocation, at least the logical size.
    pub fn knodes_mem(&self) -> usize {
        self.nodes.capacity() * size_of::<KNode<K>>()
    }

    /// All nodes in index order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &KNode<K>)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as NodeId, n))
    }
}

/// A static, height-balanced B+ tree ready to be queried.
#[derive(Debug, Clone)]
pub struct Tree<K, V> {
    store: NodeStore<K>,
    records: Vec<Record<K, V>>,
    order: usize,
    maxheight: usize,
}

impl<K, V> Tree<K, V>
where
    K: Ord + Copy,
{
    /// Assemble a tree from an externally built node array and records. The
    /// structure is verified and the height derived before it is accepted.
    pub fn from_parts(
        order: usize,
        nodes: Vec<KNode<K>>,
        records: Vec<Record<K, V>>,
    ) -> Result<Self> {
        if order < MIN_ORDER {
            return Err(TreeError::InvalidOrder {
                order,
                min: MIN_ORDER,
            });
        }
        let store = NodeStore::new(nodes);
        let maxheight = verify(order, &store, &records)?;
        Ok(Tree {
            store,
            records,
            order,
            maxheight,
        })
    }

    // Callers guarantee the structure, as the bulk loader does.
    pub(crate) fn from_verified(
        order: usize,
        maxheight: usize,
        store: NodeStore<K>,
        records: Vec<Record<K, V>>,
    ) -> Self {
        debug_assert_eq!(verify(order, &store, &records), Ok(maxheight));
        Tree {
            store,
            records,
            order,
            maxheight,
        }
    }

    /// Re-check every structural invariant.
    pub fn verify(&self) -> bool {
        verify(self.order, &self.store, &self.records) == Ok(self.maxheight)
    }

    /// The node store.
    pub fn store(&self) -> &NodeStore<K> {
        &self.store
    }

    /// The record array, in key order.
    pub fn records(&self) -> &[Record<K, V>] {
        &self.records
    }

    /// Maximum children per internal node.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Descent steps from the root to any leaf.
    pub fn maxheight(&self) -> usize {
        self.maxheight
    }

    /// Logical node count.
    pub fn knodes_elem(&self) -> usize {
        self.store.knodes_elem()
    }

    /// Size in bytes of the node allocation.
    pub fn knodes_mem(&self) -> usize {
        self.store.knodes_mem()
    }

    /// Size in bytes of the record allocation.
    pub fn records_mem(&self) -> usize {
        self.records.capacity() * size_of::<Record<K, V>>()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the tree holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Give back the node array and records.
    pub fn into_parts(self) -> (Vec<KNode<K>>, Vec<Record<K, V>>) {
        (self.store.nodes, self.records)
    }
}

// Returns the uniform leaf depth on success.
fn verify<K, V>(order: usize, store: &NodeStore<K>, records: &[Record<K, V>]) -> Result<usize>
where
    K: Ord + Copy,
{
    let elem = store.knodes_elem();
    if elem == 0 {
        return Err(TreeError::EmptyStore);
    }

    let mut seen = vec![false; elem];
    let mut leaf_depth: Option<usize> = None;
    let mut next_record = 0;
    // Depth first, children pushed right to left so leaves pop in key order.
    // Each entry carries the exclusive key bounds its subtree must respect.
    let mut stack: Vec<(NodeId, usize, Option<K>, Option<K>)> = vec![(ROOT, 0, None, None)];

    while let Some((id, depth, lo, hi)) = stack.pop() {
        let slot = &mut seen[id as usize];
        if *slot {
            return Err(TreeError::SharedNode { node: id });
        }
        *slot = true;

        let node = store.get(id);
        let keys = node.keys();
        if keys.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TreeError::UnsortedNode { node: id });
        }
        let in_bounds = |k: &K| {
            !matches!(lo, Some(lo) if *k < lo) && !matches!(hi, Some(hi) if *k >= hi)
        };
        if !keys.iter().all(in_bounds) {
            return Err(TreeError::KeyOutOfRange { node: id });
        }
        if keys.len() > order - 1 {
            return Err(TreeError::TooManyKeys {
                node: id,
                keys: keys.len(),
                order,
                max: order - 1,
            });
        }

        match node.link() {
            Link::Branch(children) => {
                if children.len() != keys.len() + 1 {
                    return Err(TreeError::ChildCount {
                        node: id,
                        keys: keys.len(),
                        children: children.len(),
                    });
                }
                for (idx, &child) in children.iter().enumerate().rev() {
                    if child as usize >= elem {
                        return Err(TreeError::ChildOutOfBounds {
                            node: id,
                            child,
                            elem,
                        });
                    }
                    let clo = if idx == 0 { lo } else { Some(keys[idx - 1]) };
                    let chi = if idx == keys.len() { hi } else { Some(keys[idx]) };
                    stack.push((child, depth + 1, clo, chi));
                }
            }
            Link::Leaf { start, count } => {
                match leaf_depth {
                    None => leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(TreeError::Unbalanced {
                            node: id,
                            depth,
                            expected,
                        });
                    }
                    Some(_) => {}
                }
                if *start != next_record {
                    return Err(TreeError::LeafGap {
                        node: id,
                        start: *start,
                        expected: next_record,
                    });
                }
                if *count != keys.len() {
                    return Err(TreeError::LeafKeys { node: id });
                }
                let owned = start
                    .checked_add(*count)
                    .and_then(|end| records.get(*start..end))
                    .ok_or(TreeError::RecordCoverage {
                        covered: start.saturating_add(*count),
                        records: records.len(),
                    })?;
                if !owned.iter().map(|r| &r.key).eq(keys.iter()) {
                    return Err(TreeError::LeafKeys { node: id });
                }
                next_record += *count;
            }
        }
    }

    if next_record != records.len() {
        return Err(TreeError::RecordCoverage {
            covered: next_record,
            records: records.len(),
        });
    }
    // The root always exists, so at least one leaf was reached.
    Ok(leaf_depth.unwrap_or(0))
}
