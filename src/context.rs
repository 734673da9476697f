//! Execution-context classification.
//!
//! Given "who is running right now", the trial caller, and the designated
//! pool, decide which of the three contexts the current observation belongs
//! to. The classifier is a total pure function of three identity values; it
//! never fails and has no side effects.

use core::fmt;
use std::thread::ThreadId;

use crate::pool::PoolHandle;

/// Where a piece of leaf work was observed executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    /// A worker thread owned by the designated pool.
    DesignatedPoolWorker,
    /// The thread that initiated the trial. Legitimate: divide-and-conquer
    /// substrates run the smallest remaining chunk on the initiating thread
    /// instead of submitting it.
    CallerThread,
    /// Anything else: a worker of a different pool or an unrelated thread.
    /// Always a violation.
    OtherContext,
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DesignatedPoolWorker => write!(f, "designated-pool-worker"),
            Self::CallerThread => write!(f, "caller-thread"),
            Self::OtherContext => write!(f, "other-context"),
        }
    }
}

/// Classifies `current` against the trial's caller and designated pool.
///
/// Pool membership is checked before caller equality: when a trial is rooted
/// inside the pool, the "caller" is itself a pool worker, and it counts as
/// the pool.
#[must_use]
pub fn classify(current: ThreadId, caller: ThreadId, designated: &PoolHandle) -> ExecutionContext {
    if designated.is_worker(current) {
        ExecutionContext::DesignatedPoolWorker
    } else if current == caller {
        ExecutionContext::CallerThread
    } else {
        ExecutionContext::OtherContext
    }
}
