use super::{resolve, ExactMatch};
use crate::error::BatchError;
use crate::store::{NodeId, Record, Tree};

/// The per-query arrays of one point-query batch, borrowed from the caller.
///
/// `keys` and `ans` hold one entry per query, `curr_knode` and `offset` hold
/// `maxheight` entries per query. `ans[q]` is overwritten on every run:
/// `Some(record)` when `keys[q]` is present, `None` when it is not.
#[derive(Debug)]
pub struct PointSlots<'a, K, V> {
    keys: &'a [K],
    curr_knode: &'a mut [NodeId],
    offset: &'a mut [u32],
    ans: &'a mut [Option<Record<K, V>>],
}

impl<'a, K, V> PointSlots<'a, K, V> {
    /// Check the array lengths against the query count and `maxheight`.
    pub fn new(
        maxheight: usize,
        keys: &'a [K],
        curr_knode: &'a mut [NodeId],
        offset: &'a mut [u32],
        ans: &'a mut [Option<Record<K, V>>],
    ) -> Result<Self, BatchError> {
        let count = keys.len();
        BatchError::check_len("curr_knode", count * maxheight, curr_knode.len())?;
        BatchError::check_len("offset", count * maxheight, offset.len())?;
        BatchError::check_len("ans", count, ans.len())?;
        Ok(PointSlots {
            keys,
            curr_knode,
            offset,
            ans,
        })
    }

    /// Number of queries.
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Split into queries `..mid` and `mid..`. Scratch splits at `mid * height`.
    pub(crate) fn split_at(self, mid: usize, height: usize) -> (Self, Self) {
        let PointSlots {
            keys,
            curr_knode,
            offset,
            ans,
        } = self;
        let (k0, k1) = keys.split_at(mid);
        let (c0, c1) = curr_knode.split_at_mut(mid * height);
        let (o0, o1) = offset.split_at_mut(mid * height);
        let (a0, a1) = ans.split_at_mut(mid);
        (
            PointSlots {
                keys: k0,
                curr_knode: c0,
                offset: o0,
                ans: a0,
            },
            PointSlots {
                keys: k1,
                curr_knode: c1,
                offset: o1,
                ans: a1,
            },
        )
    }
}

/// Resolve one chunk of point queries. Returns the number of keys found.
pub(crate) fn point_chunk<K, V>(tree: &Tree<K, V>, slots: PointSlots<'_, K, V>) -> usize
where
    K: Ord + Copy,
    V: Clone,
{
    let PointSlots {
        keys,
        curr_knode,
        offset,
        ans,
    } = slots;
    let records = tree.records();
    let mut hits = 0;
    resolve::<K, ExactMatch, _>(
        tree.store(),
        tree.maxheight(),
        keys,
        curr_knode,
        offset,
        |q, hit| {
            hits += usize::from(hit.is_some());
            ans[q] = hit.map(|idx| records[idx].clone());
        },
    );
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TreeBuilder;

    fn tree() -> Tree<u32, &'static str> {
        let recs = vec![
            Record::new(1, "one"),
            Record::new(2, "two"),
            Record::new(3, "three"),
            Record::new(4, "four"),
            Record::new(5, "five"),
            Record::new(6, "six"),
            Record::new(7, "seven"),
        ];
        TreeBuilder::new(3).build(recs).unwrap()
    }

    #[test]
    fn test_point_chunk() {
        let tree = tree();
        let h = tree.maxheight();
        let keys = [4, 99, 1, 7, 0];
        let mut curr = vec![0; keys.len() * h];
        let mut off = vec![0; keys.len() * h];
        // Stale answers must be overwritten.
        let mut ans = vec![Some(Record::new(0, "stale")); keys.len()];

        let slots = PointSlots::new(h, &keys, &mut curr, &mut off, &mut ans).unwrap();
        assert_eq!(point_chunk(&tree, slots), 3);
        assert_eq!(ans[0], Some(Record::new(4, "four")));
        assert_eq!(ans[1], None);
        assert_eq!(ans[2], Some(Record::new(1, "one")));
        assert_eq!(ans[3], Some(Record::new(7, "seven")));
        assert_eq!(ans[4], None);
    }

    #[test]
    fn test_point_slots_lengths() {
        let keys = [1u32, 2];
        let mut curr = vec![0; 3];
        let mut off = vec![0; 4];
        let mut ans: Vec<Option<Record<u32, ()>>> = vec![None; 2];
        assert_eq!(
            PointSlots::new(2, &keys, &mut curr, &mut off, &mut ans).unwrap_err(),
            BatchError::LengthMismatch {
                array: "curr_knode",
                expected: 4,
                actual: 3,
            }
        );
        let mut curr = vec![0; 4];
        let mut ans: Vec<Option<Record<u32, ()>>> = vec![None; 1];
        assert!(matches!(
            PointSlots::new(2, &keys, &mut curr, &mut off, &mut ans),
            Err(BatchError::LengthMismatch { array: "ans", .. })
        ));
    }

    #[test]
    fn test_point_split() {
        let keys = [1u32, 2, 3];
        let mut curr = vec![0; 6];
        let mut off = vec![0; 6];
        let mut ans: Vec<Option<Record<u32, ()>>> = vec![None; 3];
        let slots = PointSlots::new(2, &keys, &mut curr, &mut off, &mut ans).unwrap();
        let (a, b) = slots.split_at(1, 2);
        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 2);
        assert_eq!(a.curr_knode.len(), 2);
        assert_eq!(b.offset.len(), 4);
    }
}
