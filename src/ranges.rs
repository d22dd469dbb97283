//! Conversion of BDD sets into sorted, non-overlapping ranges.

use std::collections::HashMap;

use log::debug;

use crate::bdd::{Bdd, BddAlgebra};

impl BddAlgebra {
    /// Ranges of `set` over bits `0..=max_bit`, sorted and maximally merged.
    ///
    /// Returns `None` when `limit > 0` and more than `limit` ranges are needed.
    /// Multi-terminal leaves are treated as `True`.
    pub fn to_ranges(&self, set: Bdd, max_bit: u32, limit: usize) -> Option<Vec<(u32, u32)>> {
        debug!("to_ranges(set = {}, max_bit = {}, limit = {})", set, max_bit, limit);
        let ranges = self.all_ranges(set, max_bit);
        if limit > 0 && ranges.len() > limit {
            return None;
        }
        Some(ranges)
    }

    /// Ranges of `set` over bits `0..=max_bit`, however many there are.
    pub fn all_ranges(&self, set: Bdd, max_bit: u32) -> Vec<(u32, u32)> {
        assert!(max_bit <= 31, "max_bit should be in the range 0..=31");
        let ranges = self.ranges_below(&mut HashMap::new(), set, max_bit as i32 + 1);
        ranges.into_iter().map(|(lo, hi)| (lo as u32, hi as u32)).collect()
    }

    /// Ranges of `set` restricted to the `bits` lowest bits.
    fn ranges_below(&self, memo: &mut HashMap<Bdd, Vec<(u64, u64)>>, set: Bdd, bits: i32) -> Vec<(u64, u64)> {
        if set == Bdd::FALSE {
            return Vec::new();
        }
        if set == Bdd::TRUE || self.is_leaf(set) {
            return vec![(0, (1u64 << bits) - 1)];
        }

        let ordinal = self.ordinal(set);
        debug_assert!(ordinal < bits);

        let own = match memo.get(&set) {
            Some(ranges) => ranges.clone(),
            None => {
                let offset = 1u64 << ordinal;
                let mut ranges = self.ranges_below(memo, self.zero(set), ordinal);
                let upper = self.ranges_below(memo, self.one(set), ordinal);
                extend_merged(&mut ranges, upper.into_iter().map(|(lo, hi)| (lo + offset, hi + offset)));
                memo.insert(set, ranges.clone());
                ranges
            }
        };

        lift(own, ordinal + 1, bits)
    }
}

/// Repeat `ranges` (over `k` bits) for every assignment of the bits `k..bits`.
fn lift(ranges: Vec<(u64, u64)>, k: i32, bits: i32) -> Vec<(u64, u64)> {
    if k == bits || ranges.is_empty() {
        return ranges;
    }
    let mut res = Vec::new();
    for prefix in 0..(1u64 << (bits - k)) {
        let shift = prefix << k;
        extend_merged(&mut res, ranges.iter().map(|&(lo, hi)| (lo | shift, hi | shift)));
    }
    res
}

/// Append sorted ranges, merging a range with its predecessor when adjacent.
fn extend_merged(res: &mut Vec<(u64, u64)>, ranges: impl IntoIterator<Item = (u64, u64)>) {
    for (lo, hi) in ranges {
        if let Some(last) = res.last_mut() {
            if last.1 + 1 == lo {
                last.1 = hi;
                continue;
            }
        }
        res.push((lo, hi));
    }
}
