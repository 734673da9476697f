//! Evidence accumulation for one trial.
//!
//! Two monotonic boolean facts, written by arbitrarily many concurrently
//! executing leaves without external locking:
//!
//! - `never_unexpected`: starts `true`, can only go `true → false`
//! - `saw_designated_pool`: starts `false`, can only go `false → true`
//!
//! # Memory-visibility discipline
//!
//! Leaf writes use `Relaxed` stores. Strongly-ordered writes on every leaf
//! would be prohibitively expensive for large ranges, and they are not
//! needed: the flags are monotonic (racing writers can only agree on the
//! final value), and the reduction's structural join already establishes a
//! happens-before edge from every leaf to the point where results are
//! combined. [`finalize`](EvidenceCollector::finalize) issues a single
//! acquire fence and must be called only after the reduction has returned;
//! calling it while leaves may still be running reads garbage.
//!
//! A collector belongs to exactly one trial. Trials never overlap, and each
//! trial constructs a fresh collector.

use core::fmt;
use std::sync::atomic::{fence, AtomicBool, Ordering};

/// Monotonic evidence flags for a single trial.
#[derive(Debug)]
pub struct EvidenceCollector {
    never_unexpected: AtomicBool,
    saw_designated_pool: AtomicBool,
}

impl Default for EvidenceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceCollector {
    /// Fresh flags: nothing unexpected seen, pool not yet seen.
    #[must_use]
    pub fn new() -> Self {
        Self {
            never_unexpected: AtomicBool::new(true),
            saw_designated_pool: AtomicBool::new(false),
        }
    }

    /// Records that a leaf ran in an illegitimate context.
    ///
    /// Callable concurrently from any number of leaves; idempotent.
    pub fn record_unexpected(&self) {
        self.never_unexpected.store(false, Ordering::Relaxed);
    }

    /// Records that a leaf ran on a worker of the designated pool.
    ///
    /// Callable concurrently from any number of leaves; idempotent.
    pub fn record_saw_designated_pool(&self) {
        self.saw_designated_pool.store(true, Ordering::Relaxed);
    }

    /// Reads both flags with a single fencing read.
    ///
    /// Must be called only after the reduction's join has completed; the
    /// join's release/acquire edge is what guarantees every leaf's relaxed
    /// store is visible here.
    #[must_use]
    pub fn finalize(&self) -> Evidence {
        fence(Ordering::Acquire);
        Evidence {
            never_unexpected: self.never_unexpected.load(Ordering::Relaxed),
            saw_designated_pool: self.saw_designated_pool.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the two evidence flags after a trial's join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Evidence {
    /// No leaf ran in an illegitimate context.
    pub never_unexpected: bool,
    /// At least one leaf ran on the designated pool.
    pub saw_designated_pool: bool,
}

impl Evidence {
    /// The designated-pool guarantee: nothing illegitimate, pool used at
    /// least once.
    #[must_use]
    pub fn holds(&self) -> bool {
        self.never_unexpected && self.saw_designated_pool
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "never_unexpected={} saw_designated_pool={}",
            self.never_unexpected, self.saw_designated_pool
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_collector_has_no_pool_sighting() {
        let evidence = EvidenceCollector::new().finalize();
        assert!(evidence.never_unexpected);
        assert!(!evidence.saw_designated_pool);
        assert!(!evidence.holds());
    }

    #[test]
    fn flags_are_monotonic_and_idempotent() {
        let collector = EvidenceCollector::new();
        collector.record_unexpected();
        collector.record_unexpected();
        collector.record_saw_designated_pool();
        collector.record_saw_designated_pool();

        let evidence = collector.finalize();
        assert!(!evidence.never_unexpected);
        assert!(evidence.saw_designated_pool);
        assert!(!evidence.holds());

        // No operation can revert either flag.
        collector.record_saw_designated_pool();
        let again = collector.finalize();
        assert_eq!(evidence, again);
    }

    #[test]
    fn holds_requires_both_facts() {
        let collector = EvidenceCollector::new();
        collector.record_saw_designated_pool();
        assert!(collector.finalize().holds());

        collector.record_unexpected();
        assert!(!collector.finalize().holds());
    }
}
