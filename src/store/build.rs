//! Bulk loading of a perfectly balanced tree from sorted records.

use tracing::debug;

use super::{KNode, NodeId, NodeStore, Record, Tree, MIN_ORDER};
use crate::error::{Result, TreeError};

/// Builds a [`Tree`] bottom up from records already in key order.
///
/// Leaves are filled as evenly as the record count allows, then each level
/// above groups the one below into as few parents as `order` permits. Every
/// leaf therefore ends up at the same depth. Nodes are laid out level by
/// level with the root at index 0 and the leaves last, so the nodes visited
/// at any one descent level are contiguous.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder {
    order: usize,
}

// A node under construction, with the smallest key in its subtree.
struct Pending<K> {
    min: Option<K>,
    node: KNode<K>,
}

impl TreeBuilder {
    /// A builder for trees of the given order (maximum children per node).
    pub fn new(order: usize) -> Self {
        TreeBuilder { order }
    }

    /// Build from records in strictly ascending key order.
    pub fn build<K, V>(self, records: Vec<Record<K, V>>) -> Result<Tree<K, V>>
    where
        K: Ord + Copy,
    {
        let order = self.order;
        if order < MIN_ORDER {
            return Err(TreeError::InvalidOrder {
                order,
                min: MIN_ORDER,
            });
        }
        if let Some(position) = records
            .windows(2)
            .position(|w| w[0].key >= w[1].key)
        {
            return Err(TreeError::UnsortedRecords {
                position: position + 1,
            });
        }

        // Child ids inside `levels[i]` are positions within `levels[i - 1]`
        // until the final layout rebases them.
        let mut levels: Vec<Vec<Pending<K>>> = vec![leaves(&records, order - 1)];
        while levels[levels.len() - 1].len() > 1 {
            let below = &levels[levels.len() - 1];
            let parents = branches(below, order);
            levels.push(parents);
        }

        let maxheight = levels.len() - 1;
        let elem: usize = levels.iter().map(Vec::len).sum();
        let mut nodes = Vec::with_capacity(elem);
        // Root level first. `base` is where the level below will start.
        let mut base = 0;
        for level in levels.into_iter().rev() {
            base += level.len();
            for Pending { node, .. } in level {
                nodes.push(rebase(node, base as NodeId));
            }
        }

        debug!(
            order,
            maxheight,
            knodes = nodes.len(),
            records = records.len(),
            "bulk loaded tree"
        );
        Ok(Tree::from_verified(
            order,
            maxheight,
            NodeStore::new(nodes),
            records,
        ))
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        TreeBuilder::new(crate::DEFAULT_ORDER)
    }
}

// Sizes for splitting `n` items into the fewest groups of at most `cap`,
// as evenly as possible. Always at least one group.
fn even_groups(n: usize, cap: usize) -> impl Iterator<Item = usize> {
    let groups = n.div_ceil(cap).max(1);
    let (each, extra) = (n / groups, n % groups);
    (0..groups).map(move |g| each + usize::from(g < extra))
}

fn leaves<K: Ord + Copy, V>(records: &[Record<K, V>], cap: usize) -> Vec<Pending<K>> {
    let mut start = 0;
    even_groups(records.len(), cap)
        .map(|size| {
            let owned = &records[start..start + size];
            let node = KNode::leaf(owned.iter().map(|r| r.key), start);
            start += size;
            Pending {
                min: owned.first().map(|r| r.key),
                node,
            }
        })
        .collect()
}

fn branches<K: Ord + Copy>(below: &[Pending<K>], order: usize) -> Vec<Pending<K>> {
    let mut first = 0;
    even_groups(below.len(), order)
        .map(|size| {
            let group = &below[first..first + size];
            // Only the leftmost leaf of an empty tree lacks a min, and it is
            // never grouped with siblings.
            let keys = group[1..].iter().filter_map(|p| p.min);
            let children = (first..first + size).map(|c| c as NodeId);
            let node = KNode::branch(keys, children);
            first += size;
            Pending {
                min: group[0].min,
                node,
            }
        })
        .collect()
}

fn rebase<K: Ord + Copy>(node: KNode<K>, base: NodeId) -> KNode<K> {
    match node.children() {
        Some(children) => {
            let children: Vec<NodeId> = children.iter().map(|c| c + base).collect();
            KNode::branch(node.keys().iter().copied(), children)
        }
        None => node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Link, ROOT};

    fn records(n: u32) -> Vec<Record<u32, u32>> {
        (1..=n).map(|k| Record::new(k, k * 100)).collect()
    }

    #[test]
    fn test_even_groups() {
        assert_eq!(even_groups(7, 2).collect::<Vec<_>>(), vec![2, 2, 2, 1]);
        assert_eq!(even_groups(4, 3).collect::<Vec<_>>(), vec![2, 2]);
        assert_eq!(even_groups(9, 3).collect::<Vec<_>>(), vec![3, 3, 3]);
        assert_eq!(even_groups(0, 3).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_build_order3_seven() {
        let _ = tracing_subscriber::fmt::try_init();
        let tree = TreeBuilder::new(3).build(records(7)).unwrap();
        assert_eq!(tree.maxheight(), 2);
        // root + 2 branches + 4 leaves
        assert_eq!(tree.knodes_elem(), 7);
        assert!(tree.verify());

        let store = tree.store();
        assert_eq!(store.root().keys(), &[5]);
        assert_eq!(store.root().children(), Some(&[1, 2][..]));
        assert_eq!(store.get(1).keys(), &[3]);
        assert_eq!(store.get(2).keys(), &[7]);
        assert_eq!(store.get(3).link(), &Link::Leaf { start: 0, count: 2 });
        assert_eq!(store.get(6).keys(), &[7]);
        // Leaves are the last level.
        assert!(store.iter().skip(3).all(|(_, n)| n.is_leaf()));
    }

    #[test]
    fn test_build_empty() {
        let tree = TreeBuilder::new(4).build(Vec::<Record<u32, ()>>::new()).unwrap();
        assert_eq!(tree.maxheight(), 0);
        assert_eq!(tree.knodes_elem(), 1);
        assert!(tree.store().get(ROOT).is_leaf());
        assert!(tree.is_empty());
        assert!(tree.verify());
    }

    #[test]
    fn test_build_single_leaf() {
        let tree = TreeBuilder::new(8).build(records(7)).unwrap();
        assert_eq!(tree.maxheight(), 0);
        assert_eq!(tree.store().root().records(), Some(0..7));
    }

    #[test]
    fn test_build_many_orders() {
        for order in [3, 4, 5, 8, 16, 33] {
            for n in [1, 2, 10, 100, 1000] {
                let tree = TreeBuilder::new(order).build(records(n)).unwrap();
                assert!(tree.verify(), "order {} n {}", order, n);
                assert_eq!(tree.len(), n as usize);
            }
        }
    }

    #[test]
    fn test_build_rejects() {
        assert_eq!(
            TreeBuilder::new(2).build(records(4)).unwrap_err(),
            TreeError::InvalidOrder { order: 2, min: 3 }
        );
        let recs = vec![Record::new(1, ()), Record::new(3, ()), Record::new(3, ())];
        assert_eq!(
            TreeBuilder::new(3).build(recs).unwrap_err(),
            TreeError::UnsortedRecords { position: 2 }
        );
    }
}
