//! One verification round: run the reduction, check the checksum, read the
//! evidence, emit exactly one outcome.
//!
//! A trial is a small state machine, `Idle → Running → Completed`. Entering
//! `Running` constructs a fresh [`EvidenceCollector`] (evidence is never
//! reused across trials), roots the reduction per the scenario, and blocks
//! until the whole task tree has joined. Only then, after the structural
//! join, is the collector finalized. The caller thread identity that the
//! classifier compares against is captured where the reduction is rooted:
//! the trial thread for caller-rooted scenarios, the invoked worker for
//! pool-rooted ones.
//!
//! The checksum is decisive: a wrong sum means the splitting logic itself is
//! broken, so the trial fails regardless of what the evidence flags say.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Error;
use crate::evidence::{Evidence, EvidenceCollector};
use crate::pool::PoolPair;
use crate::reduce::{expected_sum, reduce_on};
use crate::scenario::{ReproTag, Rooting, Scenario};

/// Trial lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrialState {
    Idle,
    Running,
    Completed,
}

/// What a completed trial observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialVerdict {
    /// The sum checked out; the evidence flags are meaningful.
    Witnessed {
        /// Finalized evidence snapshot.
        evidence: Evidence,
    },
    /// The reduction returned the wrong sum: a correctness bug in the
    /// splitting logic, not a scheduling artifact.
    ChecksumMismatch {
        /// Closed-form expected sum.
        expected: u64,
        /// Sum the reduction actually produced.
        actual: u64,
    },
    /// Arithmetic overflow; the trial's results are not trustworthy.
    Aborted {
        /// The overflow that ended the trial.
        error: Error,
    },
}

impl TrialVerdict {
    /// The witnessed guarantee, when the trial got far enough to have one.
    #[must_use]
    pub fn witnessed(&self) -> Option<bool> {
        match self {
            Self::Witnessed { evidence } => Some(evidence.holds()),
            _ => None,
        }
    }
}

/// The single record a completed trial yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialOutcome {
    /// Name of the scenario this trial ran.
    pub scenario: &'static str,
    /// The scenario's expected-reproducibility tag.
    pub tag: ReproTag,
    /// What the trial observed.
    pub verdict: TrialVerdict,
    /// Whether the observation matched the scenario's asserted direction.
    pub passed: bool,
}

/// A single not-yet-run trial of one scenario.
#[derive(Debug)]
pub struct Trial {
    scenario: Scenario,
    state: TrialState,
}

impl Trial {
    /// A trial in the `Idle` state.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            state: TrialState::Idle,
        }
    }

    /// Runs the trial to completion.
    ///
    /// Consuming `self` makes `Completed` terminal: a trial yields exactly
    /// one outcome and cannot be re-run.
    #[must_use]
    pub fn run(mut self, pools: &PoolPair, stream_size: u64) -> TrialOutcome {
        debug_assert_eq!(self.state, TrialState::Idle);
        self.state = TrialState::Running;

        let n = self.scenario.effective_range(stream_size);
        let verdict = match expected_sum(n) {
            Err(error) => TrialVerdict::Aborted { error },
            Ok(expected) => {
                let evidence = Arc::new(EvidenceCollector::new());
                match self.reduce(pools, &evidence, n) {
                    Err(error) => TrialVerdict::Aborted { error },
                    Ok(actual) if actual != expected => {
                        TrialVerdict::ChecksumMismatch { expected, actual }
                    }
                    Ok(_) => TrialVerdict::Witnessed {
                        // The reduction has structurally completed; this is
                        // the one fencing read.
                        evidence: evidence.finalize(),
                    },
                }
            }
        };

        let passed = verdict.witnessed() == Some(self.scenario.expect_witnessed);
        self.state = TrialState::Completed;
        debug_assert_eq!(self.state, TrialState::Completed);

        TrialOutcome {
            scenario: self.scenario.name,
            tag: self.scenario.tag,
            verdict,
            passed,
        }
    }

    fn reduce(
        &self,
        pools: &PoolPair,
        evidence: &Arc<EvidenceCollector>,
        n: u64,
    ) -> crate::error::Result<u64> {
        let exec = pools.handle(self.scenario.exec);
        let witness = pools.handle(self.scenario.witness);
        match self.scenario.rooting {
            Rooting::Caller => reduce_on(&exec, &witness, evidence, 1, n),
            Rooting::Pool => {
                let inner_exec = exec.clone();
                let shared = Arc::clone(evidence);
                exec.invoke(move || reduce_on(&inner_exec, &witness, &shared, 1, n))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolOptions, PoolRole};
    use crate::scenario::builtin_scenarios;

    fn pools() -> PoolPair {
        PoolPair::new(PoolOptions {
            parallelism: 2,
            ..PoolOptions::default()
        })
    }

    fn scenario(name: &'static str) -> Scenario {
        builtin_scenarios()
            .into_iter()
            .find(|s| s.name == name)
            .expect("unknown scenario name")
    }

    #[test]
    fn pool_rooted_matched_witness_passes() {
        let pools = pools();
        let outcome = Trial::new(scenario("executes_in_alternate_pool")).run(&pools, 100);
        assert!(outcome.passed, "verdict: {:?}", outcome.verdict);
        assert_eq!(outcome.verdict.witnessed(), Some(true));
    }

    #[test]
    fn cross_witness_correctly_reports_false() {
        let pools = pools();
        for name in [
            "common_pool_cross_witness",
            "alternate_witness_from_common",
            "common_witness_from_alternate",
        ] {
            let outcome = Trial::new(scenario(name)).run(&pools, 100);
            assert!(outcome.passed, "{name}: {:?}", outcome.verdict);
            assert_eq!(outcome.verdict.witnessed(), Some(false), "{name}");
        }
    }

    #[test]
    fn minimal_range_never_reaches_the_pool() {
        // A one-element caller-rooted reduction runs entirely on the trial
        // thread; the designated-pool guarantee cannot hold.
        let pools = pools();
        let outcome = Trial::new(scenario("minimal_range_on_caller")).run(&pools, 100);
        assert_eq!(outcome.verdict.witnessed(), Some(false));
        assert!(!outcome.passed);
        assert_eq!(outcome.tag, ReproTag::NotReproducible);
    }

    #[test]
    fn unrepresentable_checksum_aborts_without_reducing() {
        let pools = pools();
        let huge = Scenario {
            name: "unrepresentable_checksum",
            tag: ReproTag::Reproducible,
            rooting: Rooting::Caller,
            exec: PoolRole::Common,
            witness: PoolRole::Common,
            expect_witnessed: true,
            range: Some(u64::MAX),
        };
        let outcome = Trial::new(huge).run(&pools, 100);
        assert!(matches!(outcome.verdict, TrialVerdict::Aborted { .. }));
        assert!(!outcome.passed);
    }
}
