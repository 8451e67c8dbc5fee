//! Padding (spec §4.2): right-align every sequence to a common length with
//! leading spaces, and compute the median pre-padding length used to size
//! the k-mer filter and to auto-derive τ.
//!
//! Grounded in `examples/original_source/src/starcode.c`'s `pad_useq`.

use crate::useq::UniqueSeq;

/// Pads every record in `items` to the maximum sequence length found in the
/// stack. Returns `(height, median)`: `height` is the common padded length
/// (used as the trie height), `median` is the smallest length `L` such that
/// the cumulative count of records with length `<= L` reaches half of
/// `items.len()` — computed on pre-padding lengths, per spec §4.2.
///
/// Returns `(0, 0)` for an empty stack; callers should treat an empty
/// stack as [`crate::error::ClusterError::EmptyInput`] before reaching
/// this point (spec §6.4).
pub fn pad_sequences(items: &mut [UniqueSeq]) -> (usize, usize) {
    if items.is_empty() {
        return (0, 0);
    }

    let maxlen = items.iter().map(|u| u.len()).max().unwrap_or(0);
    let mut counts = vec![0usize; maxlen + 1];
    for u in items.iter() {
        counts[u.len()] += 1;
    }

    for u in items.iter_mut() {
        let len = u.len();
        if len == maxlen {
            continue;
        }
        let mut padded = Vec::with_capacity(maxlen);
        padded.resize(maxlen - len, b' ');
        padded.extend_from_slice(&u.seq);
        u.seq = padded;
    }

    let half = items.len() / 2;
    let mut median = 0usize;
    let mut cumulative = 0usize;
    while cumulative < half && median < maxlen {
        median += 1;
        cumulative += counts[median];
    }

    (maxlen, median)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn useq(seq: &str) -> UniqueSeq {
        UniqueSeq::new(1, seq.as_bytes().to_vec(), None)
    }

    #[test]
    fn pads_to_common_length_with_leading_spaces() {
        let mut items = vec![useq("AC"), useq("ACGTG"), useq("ACG")];
        let (height, _median) = pad_sequences(&mut items);
        assert_eq!(height, 5);
        for u in &items {
            assert_eq!(u.len(), height);
        }
        assert_eq!(items[0].seq, b"   AC");
        assert_eq!(items[0].unpadded(), b"AC");
        assert_eq!(items[1].seq, b"ACGTG");
    }

    #[test]
    fn median_from_short_sequences_matches_auto_tau_scenario() {
        // S5 — construct 100 sequences of length 30 -> median should be 30.
        let mut items: Vec<UniqueSeq> = (0..100)
            .map(|i| useq(&"A".repeat(if i == 0 { 31 } else { 30 })))
            .collect();
        let (height, median) = pad_sequences(&mut items);
        assert_eq!(height, 31);
        assert_eq!(median, 30);
    }

    #[test]
    fn empty_stack_is_a_no_op() {
        let mut items: Vec<UniqueSeq> = vec![];
        assert_eq!(pad_sequences(&mut items), (0, 0));
    }

    #[test]
    fn uniform_length_leaves_sequences_untouched() {
        let mut items = vec![useq("ACGT"), useq("TTTT")];
        let (height, _) = pad_sequences(&mut items);
        assert_eq!(height, 4);
        assert_eq!(items[0].seq, b"ACGT");
    }
}
