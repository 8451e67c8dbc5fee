//! Worker (spec §4.7, `do_query`): executes one job against its trie.
//!
//! Grounded in `examples/original_source/src/starcode.c`'s `do_query`.

use crate::error::Result;
use crate::kmer::LookupFilter;
use crate::output::PairSink;
use crate::plan::Job;
use crate::trie::{Hits, Trie};
use crate::useq::UniqueSeq;

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// Runs `job` against `trie`/`lut` (already locked to this worker by the
/// scheduler's per-trie exclusivity) over the full sequence stack
/// `items`, emitting every pair found at distance `1..=tau` to `sink`.
///
/// Returns the number of queries skipped due to hit-tower overflow, so
/// the caller can fold it into a verbose diagnostic (spec §4.7 step 3's
/// truncation warning).
pub fn do_query(
    job: &Job,
    trie: &mut Trie,
    lut: &mut LookupFilter,
    items: &[UniqueSeq],
    tau: u32,
    nslots: usize,
    sink: &dyn PairSink,
    verbose: bool,
) -> Result<usize> {
    let mut hits = Hits::new(tau, nslots);
    let mut last_query: Option<usize> = None;
    let mut truncated = 0usize;

    for idx in job.start..job.end {
        let q = &items[idx];
        let do_search = lut.might_match(&q.seq);

        let slot = if job.build {
            lut.insert(&q.seq);
            // Left unfilled until after this record's own search, so a
            // build job's query can never match itself (spec §8 property 5).
            Some(trie.insert_without_alloc(&q.seq)?)
        } else {
            None
        };

        if do_search {
            let trail = if idx + 1 < job.end {
                shared_prefix_len(&q.seq, &items[idx + 1].seq)
            } else {
                0
            };
            let start = match last_query {
                Some(prev) => shared_prefix_len(&items[prev].seq, &q.seq),
                None => 0,
            };

            trie.search(&q.seq, tau, &mut hits, start, trail);

            if hits.overflowed() {
                truncated += 1;
                if verbose {
                    eprintln!("warning: hit tower overflow for query at index {idx}, skipping");
                }
            } else {
                for d in 1..=tau as usize {
                    for &rec in hits.at(d) {
                        let other = &items[rec];
                        let (a, b) = pair_labels(q, other);
                        sink.emit(&a, &b, d as u32)?;
                    }
                }
            }
        }

        if let Some(slot) = slot {
            trie.fill(slot, idx);
        }
        last_query = Some(idx);
    }

    Ok(truncated)
}

/// The two display labels for a matched pair (spec §4.7 step 4):
/// `(q.info, match.info)` for paired-end input, else the unpadded
/// sequences.
fn pair_labels(q: &UniqueSeq, other: &UniqueSeq) -> (String, String) {
    match (&q.info, &other.info) {
        (Some(qi), Some(oi)) => (qi.clone(), oi.clone()),
        _ => (q.display_seq(), other.display_seq()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::LockedWriterSink;
    use crate::trie::count_trie_nodes;
    use std::sync::Mutex as StdMutex;

    fn useq(seq: &str) -> UniqueSeq {
        UniqueSeq::new(1, seq.as_bytes().to_vec(), None)
    }

    struct RecordingSink {
        pairs: StdMutex<Vec<(String, String, u32)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                pairs: StdMutex::new(Vec::new()),
            }
        }
    }

    impl PairSink for RecordingSink {
        fn emit(&self, a: &str, b: &str, distance: u32) -> Result<()> {
            self.pairs.lock().unwrap().push((a.to_string(), b.to_string(), distance));
            Ok(())
        }
    }

    #[test]
    fn build_job_emits_pairs_for_block_and_never_self_matches() {
        let items = vec![useq("ACGT"), useq("ACGA"), useq("TTTT")];
        let seq_refs: Vec<&[u8]> = items.iter().map(|u| u.seq.as_slice()).collect();
        let nnodes = count_trie_nodes(&seq_refs, 0, 3);
        let mut trie = Trie::new(4, nnodes);
        let mut lut = LookupFilter::new(4, 4, 1);
        let job = Job {
            start: 0,
            end: 3,
            build: true,
        };
        let sink = RecordingSink::new();
        let truncated = do_query(&job, &mut trie, &mut lut, &items, 1, 100, &sink, false).unwrap();
        assert_eq!(truncated, 0);

        let pairs = sink.pairs.lock().unwrap();
        // ACGT vs ACGA differ at distance 1 and must appear exactly once;
        // TTTT is too far from both at tau=1 and must not appear.
        assert_eq!(pairs.len(), 1);
        let (a, b, d) = &pairs[0];
        assert_eq!(*d, 1);
        assert!((a == "ACGT" && b == "ACGA") || (a == "ACGA" && b == "ACGT"));
    }

    #[test]
    fn query_job_does_not_insert_into_trie() {
        let items = vec![useq("ACGT"), useq("ACGA")];
        let mut trie = Trie::new(4, 8);
        let mut lut = LookupFilter::new(4, 4, 1);
        let job = Job {
            start: 0,
            end: 2,
            build: false,
        };
        let sink = LockedWriterSink::new(Vec::new());
        let truncated = do_query(&job, &mut trie, &mut lut, &items, 1, 100, &sink, false).unwrap();
        assert_eq!(truncated, 0);
        // Nothing was ever inserted, so nothing can be found.
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "");
    }

    #[test]
    fn paired_end_info_is_used_for_emission_labels() {
        let mut items = vec![useq("ACGT"), useq("ACGA")];
        items[0].info = Some("read1/read1b".to_string());
        items[1].info = Some("read2/read2b".to_string());
        let mut trie = Trie::new(4, 8);
        let mut lut = LookupFilter::new(4, 4, 1);
        let job = Job {
            start: 0,
            end: 2,
            build: true,
        };
        let sink = RecordingSink::new();
        do_query(&job, &mut trie, &mut lut, &items, 1, 100, &sink, false).unwrap();
        let pairs = sink.pairs.lock().unwrap();
        assert_eq!(pairs.len(), 1);
        let (a, b, _) = &pairs[0];
        assert!(a.contains('/') && b.contains('/'));
    }
}
