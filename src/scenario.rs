//! Scenario definitions for the repeated-trial experiment.
//!
//! A scenario fixes everything about a trial except its scheduling luck:
//! how the reduction is rooted, which pool receives forked work, which pool
//! the leaves classify against, which verdict the scenario asserts, and
//! (up front, at definition time) whether that assertion is expected to
//! hold on every repetition. The tag is an explicit enum attached to the
//! definition; nothing is derived at runtime.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::pool::PoolRole;

/// Whether a scenario's assertion is expected to hold across repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReproTag {
    /// The assertion should hold on every repetition; a failure is a bug.
    Reproducible,
    /// The assertion depends on scheduling luck (typically on whether the
    /// range was large enough to force splitting); failures are recorded
    /// but are not bugs.
    NotReproducible,
}

impl fmt::Display for ReproTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reproducible => write!(f, "reproducible"),
            Self::NotReproducible => write!(f, "not-reproducible"),
        }
    }
}

/// Where the root of the reduction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rooting {
    /// The trial thread runs the root inline and forks into the execution
    /// pool; it helps drain the queue while joining, so leaves may run on
    /// it.
    Caller,
    /// The whole reduction is handed to a pool worker via `invoke`; the
    /// trial thread parks and never executes work.
    Pool,
}

impl fmt::Display for Rooting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "caller-rooted"),
            Self::Pool => write!(f, "pool-rooted"),
        }
    }
}

/// One fixed trial configuration, repeated `trials` times per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    /// Stable scenario name, used for grouping in the report.
    pub name: &'static str,
    /// Expected-reproducibility tag, assigned at definition time.
    pub tag: ReproTag,
    /// How the reduction is rooted.
    pub rooting: Rooting,
    /// Pool that receives forked work (and the root, when pool-rooted).
    pub exec: PoolRole,
    /// Pool the leaves classify against: the designated pool under test.
    pub witness: PoolRole,
    /// The asserted verdict: `true` means "the designated-pool guarantee
    /// should hold", `false` means "it should be correctly reported as not
    /// holding".
    pub expect_witnessed: bool,
    /// Range-size override for this scenario; `None` uses the configured
    /// stream size.
    pub range: Option<u64>,
}

impl Scenario {
    /// The range this scenario reduces over, given the configured size.
    #[must_use]
    pub fn effective_range(&self, stream_size: u64) -> u64 {
        self.range.unwrap_or(stream_size)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, exec={}, witness={}, expect={})",
            self.name, self.rooting, self.exec, self.witness, self.expect_witnessed
        )
    }
}

/// The built-in scenario matrix: one control, one pool-rooted verification
/// per pool, three cross-classification sanity checks, and one minimal-range
/// probe.
///
/// The cross-classification scenarios do not test the guarantee itself, only
/// that the experiment's instruments can tell two identically configured
/// pools apart.
#[must_use]
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        // Control sample: plain caller-rooted use of the common pool. Holds
        // only when the scheduler actually split work into the pool.
        Scenario {
            name: "executes_in_common_pool",
            tag: ReproTag::NotReproducible,
            rooting: Rooting::Caller,
            exec: PoolRole::Common,
            witness: PoolRole::Common,
            expect_witnessed: true,
            range: None,
        },
        // The trick under test: root the reduction inside the alternate
        // pool, and the guarantee holds on every repetition.
        Scenario {
            name: "executes_in_alternate_pool",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Pool,
            exec: PoolRole::Alternate,
            witness: PoolRole::Alternate,
            expect_witnessed: true,
            range: None,
        },
        Scenario {
            name: "common_pool_cross_witness",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Caller,
            exec: PoolRole::Common,
            witness: PoolRole::Alternate,
            expect_witnessed: false,
            range: None,
        },
        Scenario {
            name: "alternate_witness_from_common",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Pool,
            exec: PoolRole::Common,
            witness: PoolRole::Alternate,
            expect_witnessed: false,
            range: None,
        },
        Scenario {
            name: "common_witness_from_alternate",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Pool,
            exec: PoolRole::Alternate,
            witness: PoolRole::Common,
            expect_witnessed: false,
            range: None,
        },
        // Pool-rooted against the common pool: invoke parks the caller
        // strictly, so this holds deterministically here.
        Scenario {
            name: "executes_in_common_pool_rooted",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Pool,
            exec: PoolRole::Common,
            witness: PoolRole::Common,
            expect_witnessed: true,
            range: None,
        },
        // A one-element range never splits, so the root leaf runs wherever
        // the trial was rooted, i.e. on the caller. The guarantee is not
        // expected to hold.
        Scenario {
            name: "minimal_range_on_caller",
            tag: ReproTag::NotReproducible,
            rooting: Rooting::Caller,
            exec: PoolRole::Common,
            witness: PoolRole::Common,
            expect_witnessed: true,
            range: Some(1),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_unique() {
        let scenarios = builtin_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[test]
    fn every_expect_false_scenario_is_reproducible() {
        // "Correctly reports false" is a deterministic instrument check.
        for scenario in builtin_scenarios() {
            if !scenario.expect_witnessed {
                assert_eq!(scenario.tag, ReproTag::Reproducible, "{}", scenario.name);
            }
        }
    }

    #[test]
    fn expect_false_scenarios_cross_their_pools() {
        for scenario in builtin_scenarios() {
            if !scenario.expect_witnessed {
                assert_ne!(scenario.exec, scenario.witness, "{}", scenario.name);
            }
        }
    }

    #[test]
    fn range_override_wins_over_stream_size() {
        let scenarios = builtin_scenarios();
        let minimal = scenarios
            .iter()
            .find(|s| s.range.is_some())
            .expect("a range-override scenario exists");
        assert_eq!(minimal.effective_range(100), 1);

        let control = scenarios
            .iter()
            .find(|s| s.range.is_none())
            .expect("a default-range scenario exists");
        assert_eq!(control.effective_range(100), 100);
    }
}
