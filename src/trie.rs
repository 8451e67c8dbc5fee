//! Approximate-search trie (spec §4.7, §6.3): a fixed-alphabet arena trie
//! keyed by padded sequences, with bounded edit-distance search.
//!
//! The specification treats the trie as an external collaborator behind a
//! narrow contract (`insert_without_alloc`, `search`, `new_trie`,
//! `count_trie_nodes`) and the retrieved original source kept only
//! `starcode.c`, not the trie implementation itself. This module is
//! therefore a from-scratch, from-first-principles implementation of that
//! contract: a dense arena (`Vec<Node>`, sized up front by
//! [`count_trie_nodes`]) of 5-ary nodes over the alphabet `{space, A, C, G,
//! T}`, and a recursive bounded Levenshtein search that prunes a branch as
//! soon as its dynamic-programming row's minimum exceeds τ — the standard
//! trie/DP hybrid used by agrep-style approximate matchers.
//!
//! Arena layout is adapted from `ryancinsight-halo`'s
//! `collections::trie::node` module: a flat slot vector addressed by
//! index rather than a pointer tree, so the whole trie is one contiguous
//! allocation sized once and never reallocated during a build job (the
//! "without_alloc" half of the contract).
//!
//! The alphabet is `{space, A, C, G, T, N}` (spec.md's "alphabet ⊆
//! {A,C,G,T,N, space}"): the ambiguity code `N` is a valid sequence byte
//! even though the source's `seq2id` treats it as unencodable for k-mer
//! purposes ("If sequence contains 'N' seq2id will return -1", per
//! `original_source/src/starcode.c`) — that exclusion is specific to the
//! lookup filter (see [`crate::kmer`]), not to the trie, which must still
//! be able to store and compare sequences containing it.
//!
//! **Padding is a free gap, not an ordinary symbol.** Every stored and
//! queried sequence is right-padded with leading spaces purely so the
//! trie has a uniform depth (spec §4.2); the pad region carries no
//! information and must not count toward the reported distance, or two
//! sequences of different *unpadded* length get overcharged by their
//! length difference. Scenario S3 is the canonical case: `"ACGT"` vs
//! `"ACGGT"` (one insertion, τ=1) pad to `" ACGT"`/`"ACGGT"`, whose plain
//! Levenshtein distance is 2, not the true 1. The DP below therefore
//! treats consuming a pad space — on either side, stored or query — as a
//! free deletion/insertion; only consuming or mismatching a real base
//! costs 1. Substitution cost is unaffected (matching bytes, pad or
//! real, already cost 0).
//!
//! `start`/`trail` are real optimizations:
//! - `trail` is implemented exactly as specified (§4.7): while descending
//!   within the first `trail` levels, the search does not recurse into
//!   the *exact-match* child, because any hit reachable that way is
//!   reachable identically from the next query (which shares that
//!   prefix) and would otherwise be found, and its pair emitted, twice.
//! - `start` is a provably-safe closed-form shortcut rather than a
//!   cross-call cache, gated on the *exact-match spine*: the path from
//!   the root where every byte visited so far, not just the current one,
//!   equals the query's own byte at that depth. Only on that spine does
//!   the stored prefix consumed so far literally equal `seq[0..depth]`,
//!   so the row at depth `d` reduces to the distance between two
//!   prefixes of the query itself — under the pad-free cost above, the
//!   absolute difference of their *real*-character counts, not their raw
//!   index difference. A branch that ever takes a non-exact child falls
//!   off the spine for the rest of its descent, even if a later child
//!   happens to match the query again; such a branch always runs the
//!   general recurrence.

use crate::error::{ClusterError, Result};

const ALPHABET: usize = 6;
const NONE: u32 = u32::MAX;
const PAD_CODE: usize = 0;

fn code(byte: u8) -> Option<usize> {
    match byte {
        b' ' => Some(PAD_CODE),
        b'A' | b'a' => Some(1),
        b'C' | b'c' => Some(2),
        b'G' | b'g' => Some(3),
        b'T' | b't' => Some(4),
        b'N' | b'n' => Some(5),
        _ => None,
    }
}

/// Cost of deleting/inserting a character whose alphabet code is `c`: free
/// for the pad space, one otherwise.
fn indel_cost(c: usize) -> i64 {
    if c == PAD_CODE {
        0
    } else {
        1
    }
}

#[derive(Clone, Copy)]
struct Node {
    children: [u32; ALPHABET],
    /// Index into the caller's record store. Left `None` by
    /// `insert_without_alloc` until the caller fills it post-search, so a
    /// build job's own query never matches itself (spec §4.7 step 2, §8
    /// property 5).
    slot: Option<usize>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: [NONE; ALPHABET],
            slot: None,
        }
    }
}

/// A handle to a trie leaf returned by [`Trie::insert_without_alloc`]. Pass
/// it to [`Trie::fill`] once the caller is ready to let the slot match.
#[derive(Clone, Copy)]
pub struct NodeSlot(u32);

/// Estimates the number of non-root trie nodes needed to insert the
/// distinct sequences in `seqs[lo..hi]` (already sorted by `(len, seq)`,
/// as nuke-sort leaves them): the first sequence contributes one node per
/// character, and each subsequent one contributes one node per character
/// beyond its shared prefix with its predecessor (spec §4.5 step 2). Pass
/// the result as [`Trie::new`]'s `capacity_hint` — the root itself is
/// allocated separately by `new`.
///
/// Returns 0 for an empty range — the source's `count_trie_nodes`
/// computes `strlen(seqs[lo]) - 1` unconditionally, which is undefined
/// when `lo == hi`; this guards that case explicitly rather than
/// reproducing the undefined behavior (spec's Open Questions).
pub fn count_trie_nodes(seqs: &[&[u8]], lo: usize, hi: usize) -> usize {
    if lo >= hi {
        return 0;
    }
    let mut total = seqs[lo].len();
    for k in lo + 1..hi {
        let shared = shared_prefix_len(seqs[k - 1], seqs[k]);
        total += seqs[k].len() - shared;
    }
    total
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// The arena-backed trie itself, keyed by sequences of a fixed `height`.
pub struct Trie {
    height: usize,
    nodes: Vec<Node>,
}

impl Trie {
    /// Allocates a trie for sequences of length `height`, with room for
    /// `capacity_hint` nodes (typically [`count_trie_nodes`]'s estimate)
    /// pre-reserved so inserts for this trie's block never reallocate.
    pub fn new(height: usize, capacity_hint: usize) -> Self {
        let mut nodes = Vec::with_capacity(capacity_hint.max(1));
        nodes.push(Node::new());
        Self { height, nodes }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Inserts `seq` (which must have length `self.height`), allocating
    /// only nodes that do not already exist along its path. Returns a
    /// handle to the leaf slot, left unfilled — see [`Trie::fill`].
    pub fn insert_without_alloc(&mut self, seq: &[u8]) -> Result<NodeSlot> {
        if seq.len() != self.height {
            return Err(ClusterError::InvariantViolation(format!(
                "insert length {} does not match trie height {}",
                seq.len(),
                self.height
            )));
        }
        let mut cur = 0u32;
        for &byte in seq {
            let c = code(byte).ok_or_else(|| {
                ClusterError::InvariantViolation(format!("non-alphabet byte {byte:#x} in trie insert"))
            })?;
            let next = self.nodes[cur as usize].children[c];
            cur = if next == NONE {
                let idx = self.nodes.len() as u32;
                self.nodes.push(Node::new());
                self.nodes[cur as usize].children[c] = idx;
                idx
            } else {
                next
            };
        }
        Ok(NodeSlot(cur))
    }

    /// Fills a previously-returned leaf slot with `record`, the index the
    /// caller uses to identify which stored sequence a future hit refers
    /// to (spec §4.7 step 5).
    pub fn fill(&mut self, slot: NodeSlot, record: usize) {
        self.nodes[slot.0 as usize].slot = Some(record);
    }

    /// Searches for every stored sequence within edit distance τ of `seq`,
    /// grouping results into `hits` by exact distance (spec §4.7 step 3).
    /// `start` and `trail` are the locality hints described in the module
    /// documentation; both default sensibly to 0 (no hint).
    pub fn search(&self, seq: &[u8], tau: u32, hits: &mut Hits, start: usize, trail: usize) {
        hits.clear();
        if seq.len() != self.height {
            return;
        }
        let start = start.min(self.height);
        let trail = trail.min(self.height);
        let tau = tau as i64;

        // Per-query lookup tables, computed once instead of per trie edge:
        // `qcodes[i]` is the alphabet code of `seq[i]`, and `ins_costs[i]`
        // is the cost of inserting `seq[i]` (0 for a pad space, 1 for a
        // real base).
        let qcodes: Vec<Option<usize>> = seq.iter().map(|&b| code(b)).collect();
        let ins_costs: Vec<i64> = seq
            .iter()
            .map(|&b| if b == b' ' { 0 } else { 1 })
            .collect();

        // row[i] = distance from the empty stored prefix to seq[0..i]:
        // inserting a real base costs 1, inserting a pad space is free.
        let mut row = vec![0i64; self.height + 1];
        for i in 0..self.height {
            row[i + 1] = row[i] + ins_costs[i];
        }
        let real_count = row.clone();

        self.recurse(0, 0, &qcodes, &ins_costs, &row, &real_count, tau, start, trail, true, hits);
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &self,
        node: u32,
        depth: usize,
        qcodes: &[Option<usize>],
        ins_costs: &[i64],
        row: &[i64],
        real_count: &[i64],
        tau: i64,
        start: usize,
        trail: usize,
        on_spine: bool,
        hits: &mut Hits,
    ) {
        if depth == self.height {
            let d = row[self.height];
            if (0..=tau).contains(&d) {
                if let Some(rec) = self.nodes[node as usize].slot {
                    hits.push(d as usize, rec);
                }
            }
            return;
        }

        let qcode = qcodes[depth];
        let node_ref = &self.nodes[node as usize];
        let mut newrow = vec![0i64; self.height + 1];

        for (c, &child) in node_ref.children.iter().enumerate() {
            if child == NONE {
                continue;
            }
            let is_exact = qcode == Some(c);
            if trail > 0 && depth < trail && is_exact {
                // Belongs to the next query (spec §4.7 step 3); skip.
                continue;
            }

            // On the spine only if every ancestor step was also exact —
            // a single non-exact step strands the branch off it for good.
            let child_on_spine = on_spine && is_exact;

            if child_on_spine && depth < start {
                // Closed form along the exact-match spine: see module docs.
                for (i, slot) in newrow.iter_mut().enumerate() {
                    *slot = (real_count[depth + 1] - real_count[i]).abs();
                }
            } else {
                let dc = indel_cost(c);
                newrow[0] = row[0] + dc;
                for i in 1..=self.height {
                    // Substitution compares the trie edge `c` against the
                    // query byte at *this column*, not at `depth` — the
                    // two only coincide on the diagonal.
                    let sub_cost = if qcodes[i - 1] == Some(c) { 0 } else { 1 };
                    let sub = row[i - 1] + sub_cost;
                    let del = row[i] + dc;
                    let ins = newrow[i - 1] + ins_costs[i - 1];
                    newrow[i] = sub.min(del).min(ins);
                }
            }

            if newrow.iter().copied().min().unwrap_or(0) > tau {
                continue;
            }
            self.recurse(
                child,
                depth + 1,
                qcodes,
                ins_costs,
                &newrow,
                real_count,
                tau,
                start,
                trail,
                child_on_spine,
                hits,
            );
        }
    }
}

/// Per-distance hit buckets produced by a single [`Trie::search`] call,
/// reused across queries to avoid reallocating on every call (spec's
/// "hit tower", stack-local to each worker and cleared, not freed,
/// between queries).
///
/// Unlike the source's fixed-capacity stacks, buckets here grow without a
/// hard limit; `nslots` is kept purely as the threshold against which
/// [`Hits::overflowed`] reports truncation, so this rewrite can never
/// silently drop a real hit the way an actual fixed-capacity overflow
/// would.
pub struct Hits {
    buckets: Vec<Vec<usize>>,
    nslots: usize,
}

impl Hits {
    pub fn new(tau: u32, nslots: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); tau as usize + 1],
            nslots,
        }
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    fn push(&mut self, distance: usize, record: usize) {
        self.buckets[distance].push(record);
    }

    pub fn at(&self, distance: usize) -> &[usize] {
        &self.buckets[distance]
    }

    /// True if any bucket exceeded its nominal capacity (spec §4.7 step
    /// 3, the truncation check): the caller should warn and skip this
    /// query's pair emission.
    pub fn overflowed(&self) -> bool {
        self.buckets.iter().any(|b| b.len() > self.nslots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(s: &str, height: usize) -> Vec<u8> {
        let mut v = vec![b' '; height - s.len()];
        v.extend_from_slice(s.as_bytes());
        v
    }

    #[test]
    fn exact_match_is_found_at_distance_zero() {
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"ACGT").unwrap();
        trie.fill(slot, 0);
        let mut hits = Hits::new(2, 10);
        trie.search(b"ACGT", 2, &mut hits, 0, 0);
        assert_eq!(hits.at(0), &[0]);
        assert!(hits.at(1).is_empty());
    }

    #[test]
    fn single_substitution_found_at_distance_one() {
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"ACGT").unwrap();
        trie.fill(slot, 7);
        let mut hits = Hits::new(2, 10);
        trie.search(b"ACGA", 2, &mut hits, 0, 0);
        assert_eq!(hits.at(1), &[7]);
    }

    #[test]
    fn beyond_tau_is_not_reported() {
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"AAAA").unwrap();
        trie.fill(slot, 0);
        let mut hits = Hits::new(1, 10);
        trie.search(b"TTTT", 1, &mut hits, 0, 0);
        for d in 0..=1 {
            assert!(hits.at(d).is_empty());
        }
    }

    #[test]
    fn unfilled_slot_cannot_match_itself() {
        // Simulates a build job: the inserting query's own slot is left
        // unfilled during its search, so it cannot appear as its own hit.
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"ACGT").unwrap();
        let mut hits = Hits::new(0, 10);
        trie.search(b"ACGT", 0, &mut hits, 0, 0);
        assert!(hits.at(0).is_empty());
        trie.fill(slot, 0);
        hits.clear();
        trie.search(b"ACGT", 0, &mut hits, 0, 0);
        assert_eq!(hits.at(0), &[0]);
    }

    #[test]
    fn trail_suppresses_exact_match_prefix_branch() {
        // Two sequences sharing a 2-character prefix: searching with
        // trail=2 must not report the exact-prefix-reachable neighbour,
        // since that pair is left for the next query to emit.
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"ACGT").unwrap();
        trie.fill(slot, 0);
        let mut hits = Hits::new(2, 10);
        trie.search(b"ACGG", 2, &mut hits, 0, 2);
        assert!(hits.at(1).is_empty());
        // Without the trail hint the same query does find it.
        trie.search(b"ACGG", 2, &mut hits, 0, 0);
        assert_eq!(hits.at(1), &[0]);
    }

    #[test]
    fn start_shortcut_matches_full_recurrence() {
        // The start-shortcut path must agree with the unshortcut path.
        let mut trie = Trie::new(6, 16);
        let s1 = trie.insert_without_alloc(&pad("ACGTAC", 6)).unwrap();
        trie.fill(s1, 0);
        let s2 = trie.insert_without_alloc(&pad("ACGAAC", 6)).unwrap();
        trie.fill(s2, 1);

        let mut with_start = Hits::new(3, 10);
        trie.search(b"ACGTAA", 3, &mut with_start, 4, 0);
        let mut without_start = Hits::new(3, 10);
        trie.search(b"ACGTAA", 3, &mut without_start, 0, 0);
        for d in 0..=3 {
            assert_eq!(with_start.at(d), without_start.at(d));
        }
    }

    #[test]
    fn padding_is_free_so_insertion_scores_correctly() {
        // S3 (spec §8): "ACGT" vs "ACGGT" differ by one inserted 'G'.
        // Padded to a shared height of 5 they are " ACGT" / "ACGGT"; an
        // unweighted Levenshtein over those padded strings would score 2,
        // overcounting by the free leading-pad gap.
        let mut trie = Trie::new(5, 8);
        let slot = trie.insert_without_alloc(&pad("ACGT", 5)).unwrap();
        trie.fill(slot, 0);
        let mut hits = Hits::new(1, 10);
        trie.search(b"ACGGT", 1, &mut hits, 0, 0);
        assert_eq!(hits.at(1), &[0]);
        assert!(hits.at(0).is_empty());
    }

    #[test]
    fn start_shortcut_does_not_apply_off_the_exact_match_spine() {
        // Regression: query "AAAA" against stored "TAAT" with start=3,
        // tau=1. The root step to 'T' is a mismatch, so the following
        // "A" children matching the query do not put the path back on
        // the exact-match spine even though each step looks exact in
        // isolation. True distance is 2 (substitute at position 0 and
        // 3), which must stay excluded at tau=1 regardless of `start`.
        let mut trie = Trie::new(4, 8);
        let slot = trie.insert_without_alloc(b"TAAT").unwrap();
        trie.fill(slot, 0);
        let mut hits = Hits::new(1, 10);
        trie.search(b"AAAA", 1, &mut hits, 3, 0);
        assert!(hits.at(0).is_empty());
        assert!(hits.at(1).is_empty());
        // Sanity: the unshortcut path agrees.
        let mut unshortcut = Hits::new(1, 10);
        trie.search(b"AAAA", 1, &mut unshortcut, 0, 0);
        assert!(unshortcut.at(0).is_empty());
        assert!(unshortcut.at(1).is_empty());
    }

    #[test]
    fn count_trie_nodes_guards_empty_block() {
        let seqs: Vec<&[u8]> = vec![];
        assert_eq!(count_trie_nodes(&seqs, 0, 0), 0);
    }

    #[test]
    fn count_trie_nodes_counts_shared_prefix_savings() {
        let seqs: Vec<&[u8]> = vec![b"AAAA", b"AAAC", b"AACC"];
        // "AAAA" (4) + divergent suffix of "AAAC" (1) + divergent suffix
        // of "AACC" (2), not counting the root (allocated by `Trie::new`).
        assert_eq!(count_trie_nodes(&seqs, 0, 3), 4 + 1 + 2);
    }
}
