//! A parallel approximate-string clustering engine for large collections of
//! short DNA-like sequences: given up to millions of fixed-alphabet reads
//! and an edit-distance threshold τ, emit every unordered pair of distinct
//! sequences whose Levenshtein distance is ≤ τ. Downstream clustering
//! (transitive closure, message passing) is out of scope — this crate only
//! produces the pairwise edge list.
//!
//! ## Pipeline
//!
//! [`cluster`] wires the modules together in the same order the source's
//! `starcode()` entry point does:
//!
//! 1. [`io`] parses the input (raw, FASTA, FASTQ, or paired FASTQ) into a
//!    flat [`useq::UniqueSeq`] stack.
//! 2. [`sort::nuke_sort`] sorts the stack by `(len, seq)` and destructively
//!    coalesces exact duplicates, summing their counts.
//! 3. [`pad::pad_sequences`] right-pads every record to a common length and
//!    reports the pre-padding median length.
//! 4. [`config::Tau::resolve`] derives τ from the median, unless the caller
//!    fixed it.
//! 5. [`plan::build_plan`] partitions the stack into `N` blocks, one trie +
//!    lookup filter per block, and lays out the triangular job grid that
//!    queries every block pair exactly once.
//! 6. [`scheduler::run`] dispatches the plan's jobs across a bounded thread
//!    pool, respecting per-trie mutual exclusion.
//! 7. Each [`worker::do_query`] call filters candidates through its trie's
//!    [`kmer::LookupFilter`] before falling back to [`trie::Trie::search`],
//!    emitting matched pairs through a [`output::PairSink`].

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod config;
pub mod error;
pub mod io;
pub mod kmer;
pub mod output;
pub mod pad;
pub mod plan;
pub mod scheduler;
pub mod sort;
pub mod trie;
pub mod useq;
pub mod worker;

pub use config::{Config, Tau};
pub use error::{ClusterError, Result};
pub use output::{LockedWriterSink, PairSink};
pub use useq::UniqueSeq;

use std::io::BufRead;

/// Summary of a completed clustering run, returned alongside whatever
/// [`PairSink`] received the matched pairs.
#[derive(Debug, Clone, Copy)]
pub struct ClusterStats {
    /// Number of distinct sequences after duplicate coalescing.
    pub unique_sequences: usize,
    /// Number of tries the plan partitioned the stack into.
    pub ntries: usize,
    /// The edit-distance threshold actually used (fixed or auto-derived).
    pub tau: u32,
    /// Queries skipped due to hit-tower overflow (spec §4.7 step 3):
    /// informational only, never silently dropped from the stack.
    pub truncated_queries: usize,
}

/// Runs the complete pipeline: parses `primary` (and `secondary` for
/// paired-end FASTQ), sorts and deduplicates, pads, builds the multithread
/// plan, and schedules every job, emitting matched pairs to `sink`.
pub fn cluster<R: BufRead>(
    primary: R,
    secondary: Option<R>,
    config: &Config,
    sink: &dyn PairSink,
) -> Result<ClusterStats> {
    let items = io::read_input(primary, secondary, config)?;
    if items.is_empty() {
        return Err(ClusterError::EmptyInput);
    }

    let mut sorted = sort::nuke_sort(items, config.thrmax);
    let (height, median) = pad::pad_sequences(&mut sorted);
    let tau = config.tau.resolve(median);

    let ntries = plan::choose_ntries(config.thrmax, sorted.len());
    let built_plan = plan::build_plan(&sorted, ntries, height, median, tau);

    let truncated_queries = scheduler::run(&built_plan, &sorted, tau, config, sink)?;

    Ok(ClusterStats {
        unique_sequences: sorted.len(),
        ntries,
        tau,
        truncated_queries,
    })
}
