use super::{resolve, LowerBound, UpperBound};
use crate::error::BatchError;
use crate::store::{NodeId, NodeStore};

/// The per-query arrays of one range-query batch, borrowed from the caller.
///
/// Each query `q` asks for the records with keys in `start[q]..=end[q]`. The
/// lower bound descent is tracked in `curr_knode` / `offset`, the upper bound
/// descent in `last_knode` / `offset_2`, each `maxheight` entries per query.
///
/// On return the matching records are `records[recstart[q]..][..reclength[q]]`.
/// When nothing matches, `reclength[q]` is 0 and `recstart[q]` is where a
/// record keyed `start[q]` would be inserted.
#[derive(Debug)]
pub struct RangeSlots<'a, K> {
    start: &'a [K],
    end: &'a [K],
    curr_knode: &'a mut [NodeId],
    offset: &'a mut [u32],
    last_knode: &'a mut [NodeId],
    offset_2: &'a mut [u32],
    recstart: &'a mut [usize],
    reclength: &'a mut [usize],
}

impl<'a, K> RangeSlots<'a, K> {
    /// Check the array lengths against the query count and `maxheight`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        maxheight: usize,
        start: &'a [K],
        end: &'a [K],
        curr_knode: &'a mut [NodeId],
        offset: &'a mut [u32],
        last_knode: &'a mut [NodeId],
        offset_2: &'a mut [u32],
        recstart: &'a mut [usize],
        reclength: &'a mut [usize],
    ) -> Result<Self, BatchError> {
        let count = start.len();
        let path = count * maxheight;
        BatchError::check_len("end", count, end.len())?;
        BatchError::check_len("curr_knode", path, curr_knode.len())?;
        BatchError::check_len("offset", path, offset.len())?;
        BatchError::check_len("last_knode", path, last_knode.len())?;
        BatchError::check_len("offset_2", path, offset_2.len())?;
        BatchError::check_len("recstart", count, recstart.len())?;
        BatchError::check_len("reclength", count, reclength.len())?;
        Ok(Self::new_unchecked(
            maxheight, start, end, curr_knode, offset, last_knode, offset_2, recstart,
            reclength,
        ))
    }

    // For callers that size the arrays themselves.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_unchecked(
        maxheight: usize,
        start: &'a [K],
        end: &'a [K],
        curr_knode: &'a mut [NodeId],
        offset: &'a mut [u32],
        last_knode: &'a mut [NodeId],
        offset_2: &'a mut [u32],
        recstart: &'a mut [usize],
        reclength: &'a mut [usize],
    ) -> Self {
        debug_assert_eq!(end.len(), start.len());
        debug_assert_eq!(curr_knode.len(), start.len() * maxheight);
        debug_assert_eq!(offset.len(), curr_knode.len());
        debug_assert_eq!(last_knode.len(), curr_knode.len());
        debug_assert_eq!(offset_2.len(), curr_knode.len());
        debug_assert_eq!(recstart.len(), start.len());
        debug_assert_eq!(reclength.len(), start.len());
        RangeSlots {
            start,
            end,
            curr_knode,
            offset,
            last_knode,
            offset_2,
            recstart,
            reclength,
        }
    }

    /// Number of queries.
    pub fn count(&self) -> usize {
        self.start.len()
    }

    /// Split into queries `..mid` and `mid..`. Scratch splits at `mid * height`.
    pub(crate) fn split_at(self, mid: usize, height: usize) -> (Self, Self) {
        let RangeSlots {
            start,
            end,
            curr_knode,
            offset,
            last_knode,
            offset_2,
            recstart,
            reclength,
        } = self;
        let path = mid * height;
        let (s0, s1) = start.split_at(mid);
        let (e0, e1) = end.split_at(mid);
        let (c0, c1) = curr_knode.split_at_mut(path);
        let (o0, o1) = offset.split_at_mut(path);
        let (l0, l1) = last_knode.split_at_mut(path);
        let (p0, p1) = offset_2.split_at_mut(path);
        let (r0, r1) = recstart.split_at_mut(mid);
        let (n0, n1) = reclength.split_at_mut(mid);
        (
            RangeSlots {
                start: s0,
                end: e0,
                curr_knode: c0,
                offset: o0,
                last_knode: l0,
                offset_2: p0,
                recstart: r0,
                reclength: n0,
            },
            RangeSlots {
                start: s1,
                end: e1,
                curr_knode: c1,
                offset: o1,
                last_knode: l1,
                offset_2: p1,
                recstart: r1,
                reclength: n1,
            },
        )
    }
}

/// Resolve one chunk of range queries. Returns the total matched records.
pub(crate) fn range_chunk<K: Ord + Copy>(
    store: &NodeStore<K>,
    height: usize,
    slots: RangeSlots<'_, K>,
) -> usize {
    let RangeSlots {
        start,
        end,
        curr_knode,
        offset,
        last_knode,
        offset_2,
        recstart,
        reclength,
    } = slots;

    resolve::<K, LowerBound, _>(store, height, start, curr_knode, offset, |q, lo| {
        recstart[q] = lo;
    });

    let mut matched = 0;
    resolve::<K, UpperBound, _>(store, height, end, last_knode, offset_2, |q, hi| {
        // start > end, or a gap between keys, leaves hi at or before lo.
        let len = hi.saturating_sub(recstart[q]);
        reclength[q] = len;
        matched += len;
    });
    matched
}
