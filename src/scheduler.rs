//! Scheduler (spec §4.6): dispatches jobs respecting per-trie mutual
//! exclusion and a global thread-count cap, blocking the coordinator on a
//! condition variable whenever the cap is reached.
//!
//! Grounded in `examples/original_source/src/starcode.c`'s scheduler loop
//! in `starcode()`. Two re-architectures from the Design Notes / REDESIGN
//! FLAGS are applied: the source's detached `pthread_create` per job plus
//! a single condition variable becomes `std::thread::scope` (every job
//! runs on a scoped thread, guaranteed joined before the function
//! returns — nothing to leak, nothing to join manually); and the
//! "flag == FREE" per-trie exclusivity gate is backed by an actual
//! `parking_lot::Mutex` per trie (see [`crate::plan::TrieSlot`]) rather
//! than trusting the flag alone to keep access race-free.

use crate::config::Config;
use crate::error::{ClusterError, Result};
use crate::output::PairSink;
use crate::plan::Plan;
use crate::useq::UniqueSeq;
use crate::worker::do_query;
use parking_lot::{Condvar, Mutex};

#[derive(Clone, Copy, PartialEq, Eq)]
enum TrieFlag {
    Free,
    Busy,
    Done,
}

/// Plan-wide counters guarded by the general lock (spec §5, "Shared
/// mutable state"). The per-trie `mutex[1..N]` slots the source allocates
/// are omitted, as the spec explicitly permits (§5, §4: Open Questions).
struct GeneralState {
    active: usize,
    jobsdone: usize,
    flags: Vec<TrieFlag>,
    currentjob: Vec<usize>,
}

/// Runs `plan` to completion against `items` (already padded and in the
/// order the plan's block bounds assume), emitting every matched pair to
/// `sink`. Returns the total number of queries skipped due to hit-tower
/// overflow across the whole run (spec §4.7 step 3), purely informational.
pub fn run(plan: &Plan, items: &[UniqueSeq], tau: u32, config: &Config, sink: &dyn PairSink) -> Result<usize> {
    let ntries = plan.ntries();
    let thrmax = config.thrmax.max(1);
    // Sized generously; the trie itself never reports more matches at a
    // given distance than there are records in a block, so the block
    // count is a safe, simple upper bound for "this never truncates".
    let nslots = items.len().max(16);

    let general = Mutex::new(GeneralState {
        active: 0,
        jobsdone: 0,
        flags: vec![TrieFlag::Free; ntries],
        currentjob: vec![0; ntries],
    });
    let monitor = Condvar::new();
    let truncated_total = Mutex::new(0usize);
    let error_slot: Mutex<Option<ClusterError>> = Mutex::new(None);

    std::thread::scope(|scope| {
        let mut idx = ntries.saturating_sub(1); // so (idx+1) % ntries is 0 first
        let mut tries_completed = 0usize;

        while tries_completed < ntries {
            idx = (idx + 1) % ntries;
            let mut g = general.lock();

            if g.flags[idx] != TrieFlag::Free {
                drop(g);
                continue;
            }
            let slot = &plan.tries[idx];
            if g.currentjob[idx] == slot.jobs.len() {
                g.flags[idx] = TrieFlag::Done;
                tries_completed += 1;
                continue;
            }
            if g.active >= thrmax {
                monitor.wait(&mut g);
                continue;
            }

            g.flags[idx] = TrieFlag::Busy;
            g.active += 1;
            let job = slot.jobs[g.currentjob[idx]];
            g.currentjob[idx] += 1;
            drop(g);

            let truncated_total = &truncated_total;
            let error_slot = &error_slot;
            let general = &general;
            let monitor = &monitor;

            let spawned = std::thread::Builder::new().spawn_scoped(scope, move || {
                let mut state = slot.state.lock();
                let result = do_query(
                    &job,
                    &mut state.trie,
                    &mut state.lut,
                    items,
                    tau,
                    nslots,
                    sink,
                    config.verbose,
                );
                drop(state);

                match result {
                    Ok(n) => *truncated_total.lock() += n,
                    Err(e) => *error_slot.lock() = Some(e),
                }

                let mut g = general.lock();
                g.active -= 1;
                g.jobsdone += 1;
                g.flags[idx] = TrieFlag::Free;
                drop(g);
                monitor.notify_all();
            });

            if let Err(e) = spawned {
                // The job above was already counted active/busy; undo
                // that bookkeeping since no thread is going to run it.
                let mut g = general.lock();
                g.active -= 1;
                g.flags[idx] = TrieFlag::Free;
                drop(g);
                *error_slot.lock() = Some(ClusterError::Threading(e.to_string()));
                break;
            }
        }
    });

    if let Some(e) = error_slot.into_inner() {
        return Err(e);
    }
    Ok(truncated_total.into_inner())
}
