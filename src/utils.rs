use std::borrow::Borrow;
use std::cmp::Ordering;

// Nodes are small (order - 1 keys) so a linear scan beats a binary search
// and keeps the per-lane control flow uniform.
pub(crate) fn slice_search_linear<K, Q>(slice: &[K], k: &Q) -> Result<usize, usize>
where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    for (idx, nk) in slice.iter().enumerate() {
        let r = k.cmp(nk.borrow());
        match r {
            Ordering::Greater => {}
            Ordering::Equal => return Ok(idx),
            Ordering::Less => return Err(idx),
        }
    }
    Err(slice.len())
}

/// Index of the first key strictly greater than `k`.
#[inline(always)]
pub(crate) fn slice_upper_bound<K: Ord>(slice: &[K], k: &K) -> usize {
    match slice_search_linear(slice, k) {
        Ok(idx) => idx + 1,
        Err(idx) => idx,
    }
}

/// Index of the first key greater than or equal to `k`.
#[inline(always)]
pub(crate) fn slice_lower_bound<K: Ord>(slice: &[K], k: &K) -> usize {
    match slice_search_linear(slice, k) {
        Ok(idx) | Err(idx) => idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_search_linear() {
        let s = [2, 4, 6];
        assert_eq!(slice_search_linear(&s, &1), Err(0));
        assert_eq!(slice_search_linear(&s, &4), Ok(1));
        assert_eq!(slice_search_linear(&s, &5), Err(2));
        assert_eq!(slice_search_linear(&s, &7), Err(3));
        let e: [u32; 0] = [];
        assert_eq!(slice_search_linear(&e, &7), Err(0));
    }

    #[test]
    fn test_slice_bounds() {
        let s = [2, 4, 6];
        assert_eq!(slice_upper_bound(&s, &4), 2);
        assert_eq!(slice_lower_bound(&s, &4), 1);
        assert_eq!(slice_upper_bound(&s, &3), 1);
        assert_eq!(slice_lower_bound(&s, &3), 1);
        assert_eq!(slice_upper_bound(&s, &9), 3);
        assert_eq!(slice_lower_bound(&s, &0), 0);
    }
}
