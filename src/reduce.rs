//! Divide-and-conquer range reduction with per-leaf context evidence.
//!
//! The reduction bisects an inclusive `[lo, hi]` interval until a piece is
//! at or below the split grain chosen by the execution pool, then folds the
//! leaf sequentially. Each leaf classifies the thread it finds itself on and
//! reports into the trial's [`EvidenceCollector`] before computing.
//!
//! # Fork/join shape
//!
//! Forked halves are explicit task/result cells pushed onto the execution
//! pool's queue; the forking caller computes the other half inline and then
//! joins. A join is a help-loop: while the forked cell is incomplete, the
//! joiner drains queued work via [`PoolHandle::try_run_one`] instead of
//! sleeping. Two consequences, both load-bearing:
//!
//! - joins cannot deadlock, even when every worker is itself joining
//! - a caller-rooted reduction may execute leaves on the caller thread,
//!   which is the non-determinism the experiment exists to observe
//!
//! The split grain comes from [`PoolHandle::split_grain`] and is opaque
//! here; hardcoding one would destroy the phenomenon under test.
//!
//! # Arithmetic
//!
//! Leaf folds and node combines use checked addition. Overflow invalidates
//! the correctness check, so it aborts the trial as a hard failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::context::{classify, ExecutionContext};
use crate::error::{Error, Result};
use crate::evidence::EvidenceCollector;
use crate::pool::PoolHandle;

/// Immutable per-reduction state shared by every fork.
struct ReduceCx {
    /// Pool that receives forked halves.
    exec: PoolHandle,
    /// Pool the leaves classify against (the designated pool).
    witness: PoolHandle,
    /// Thread that rooted the reduction.
    caller: ThreadId,
    /// Stop-splitting length, chosen by the execution pool.
    grain: u64,
    /// Evidence sink for this trial.
    evidence: Arc<EvidenceCollector>,
}

/// Runs the reduction over `[lo, hi]`, rooted on the current thread.
///
/// Forked halves go to `exec`; leaves classify against `witness`. The two
/// are usually the same pool, but the sanity scenarios deliberately cross
/// them. Returns the combined sum once every leaf has joined: the
/// structural-join guarantee that [`EvidenceCollector::finalize`] relies on.
///
/// An empty interval (`lo > hi`) reduces to 0 without touching the pool.
pub fn reduce_on(
    exec: &PoolHandle,
    witness: &PoolHandle,
    evidence: &Arc<EvidenceCollector>,
    lo: u64,
    hi: u64,
) -> Result<u64> {
    if lo > hi {
        return Ok(0);
    }
    let len = (hi - lo).saturating_add(1);
    let cx = Arc::new(ReduceCx {
        exec: exec.clone(),
        witness: witness.clone(),
        caller: thread::current().id(),
        grain: exec.split_grain(len),
        evidence: Arc::clone(evidence),
    });
    compute(&cx, lo, hi)
}

/// Closed-form checksum: `n * (n + 1) / 2`, checked.
pub fn expected_sum(n: u64) -> Result<u64> {
    n.checked_add(1)
        .and_then(|m| n.checked_mul(m))
        .map(|product| product / 2)
        .ok_or(Error::ChecksumOverflow { n })
}

fn compute(cx: &Arc<ReduceCx>, lo: u64, hi: u64) -> Result<u64> {
    // len <= grain, phrased to stay clear of len overflow on full-domain
    // intervals.
    if hi - lo < cx.grain {
        return leaf(cx, lo, hi);
    }

    let mid = lo + (hi - lo) / 2;
    let cell = Arc::new(ForkCell::new());
    let fork_cx = Arc::clone(cx);
    let fork_cell = Arc::clone(&cell);
    cx.exec.submit(move || {
        let result = panic::catch_unwind(AssertUnwindSafe(|| compute(&fork_cx, mid + 1, hi)));
        fork_cell.complete(result);
    });

    // Compute the left half inline, then join the fork unconditionally so
    // the structural join holds even when the left half failed.
    let left = compute(cx, lo, mid);
    let right = join(&cell, &cx.exec);
    let combined = left?
        .checked_add(right?)
        .ok_or(Error::SumOverflow { lo, hi })?;
    Ok(combined)
}

fn leaf(cx: &ReduceCx, lo: u64, hi: u64) -> Result<u64> {
    match classify(thread::current().id(), cx.caller, &cx.witness) {
        ExecutionContext::DesignatedPoolWorker => cx.evidence.record_saw_designated_pool(),
        ExecutionContext::CallerThread => {}
        ExecutionContext::OtherContext => cx.evidence.record_unexpected(),
    }

    (lo..=hi).try_fold(0_u64, |acc, value| {
        acc.checked_add(value).ok_or(Error::SumOverflow { lo, hi })
    })
}

/// Result cell for a forked half.
struct ForkCell {
    done: AtomicBool,
    slot: Mutex<Option<thread::Result<Result<u64>>>>,
}

impl ForkCell {
    fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    fn complete(&self, result: thread::Result<Result<u64>>) {
        *self.slot.lock().unwrap() = Some(result);
        self.done.store(true, Ordering::Release);
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Waits for a forked half, draining queued work instead of sleeping.
fn join(cell: &ForkCell, exec: &PoolHandle) -> Result<u64> {
    loop {
        if cell.is_done() {
            if let Some(result) = cell.slot.lock().unwrap().take() {
                return match result {
                    Ok(sum) => sum,
                    Err(payload) => panic::resume_unwind(payload),
                };
            }
        }
        if !exec.try_run_one() {
            thread::yield_now();
        }
    }
}
