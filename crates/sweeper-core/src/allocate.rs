//! Change allocation: even splitting and weighted distribution.

use crate::model::{SpendOutput, WeightedAddr};

/// Split `value` into `parts` near-equal chunks, each at least `min_chunk`.
///
/// When `value / parts` would undershoot the floor, the part count is
/// reduced to `max(1, value / min_chunk)`. The integer remainder is spread
/// one satoshi at a time over the leading chunks; zero chunks are dropped.
pub fn split_even(value: i64, parts: usize, min_chunk: i64) -> Vec<i64> {
    if parts <= 1 || value <= 0 {
        return vec![value];
    }
    let mut parts = parts as i64;
    let mut chunk = value / parts;
    if chunk < min_chunk {
        parts = (value / min_chunk).max(1);
        chunk = value / parts;
    }
    let mut out = vec![chunk; parts as usize];
    let mut rem = value - chunk * parts;
    for c in out.iter_mut() {
        if rem == 0 {
            break;
        }
        *c += 1;
        rem -= 1;
    }
    out.retain(|&c| c > 0);
    out
}

/// Distribute `total` across weighted addresses.
///
/// Each entry receives `floor(total * weight / weight_sum)`; the last entry
/// absorbs the rounding residual so the shares always sum to `total`.
/// Shares below `min_chunk` are omitted.
pub fn build_weighted_outputs(
    total: i64,
    weights: &[WeightedAddr],
    min_chunk: i64,
) -> Vec<SpendOutput> {
    if weights.is_empty() || total <= 0 {
        return Vec::new();
    }
    let sum: i64 = weights.iter().map(|w| w.weight_bp).sum();
    if sum <= 0 {
        return Vec::new();
    }
    let mut outs = Vec::with_capacity(weights.len());
    let mut acc: i64 = 0;
    for (i, w) in weights.iter().enumerate() {
        let mut share = (total * w.weight_bp) / sum;
        if i == weights.len() - 1 {
            share = total - acc;
        }
        if share >= min_chunk {
            outs.push(SpendOutput {
                address: w.address.clone(),
                value_sats: share,
            });
            acc += share;
        }
    }
    outs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(entries: &[(&str, i64)]) -> Vec<WeightedAddr> {
        entries
            .iter()
            .map(|(a, w)| WeightedAddr {
                address: (*a).into(),
                weight_bp: *w,
            })
            .collect()
    }

    #[test]
    fn split_preserves_the_total() {
        for (value, parts, floor) in [(100_000, 3, 10), (99_999, 4, 1), (7, 3, 1)] {
            let chunks = split_even(value, parts, floor);
            assert_eq!(chunks.iter().sum::<i64>(), value, "value {value}");
        }
    }

    #[test]
    fn remainder_lands_on_the_leading_chunks() {
        assert_eq!(split_even(10, 3, 1), vec![4, 3, 3]);
        assert_eq!(split_even(11, 3, 1), vec![4, 4, 3]);
    }

    #[test]
    fn part_count_shrinks_to_honor_the_floor() {
        // 100 / 5 = 20 < 30, so parts become 100 / 30 = 3.
        assert_eq!(split_even(100, 5, 30), vec![34, 33, 33]);
        // Floor larger than the value collapses to a single chunk.
        assert_eq!(split_even(100, 5, 500), vec![100]);
    }

    #[test]
    fn single_part_or_nonpositive_value_pass_through() {
        assert_eq!(split_even(500, 1, 10), vec![500]);
        assert_eq!(split_even(0, 3, 10), vec![0]);
    }

    #[test]
    fn weighted_shares_follow_basis_points() {
        let outs = build_weighted_outputs(100_000, &weights(&[("A", 7000), ("B", 3000)]), 10);
        assert_eq!(outs.len(), 2);
        assert_eq!(outs[0].value_sats, 70_000);
        assert_eq!(outs[1].value_sats, 30_000);
    }

    #[test]
    fn last_entry_absorbs_the_rounding_residual() {
        let outs = build_weighted_outputs(100, &weights(&[("A", 1), ("B", 1), ("C", 1)]), 0);
        assert_eq!(
            outs.iter().map(|o| o.value_sats).sum::<i64>(),
            100,
            "sum preserved for any weight vector"
        );
        assert_eq!(outs[2].value_sats, 34);
    }

    #[test]
    fn shares_below_the_floor_are_omitted() {
        let outs = build_weighted_outputs(1_000, &weights(&[("A", 9900), ("B", 100)]), 50);
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].address, "A");
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        assert!(build_weighted_outputs(0, &weights(&[("A", 100)]), 1).is_empty());
        assert!(build_weighted_outputs(100, &[], 1).is_empty());
        assert!(build_weighted_outputs(100, &weights(&[("A", 0)]), 1).is_empty());
    }
}
