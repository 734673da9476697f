//! Repeated-trial driver and the end-of-run report.
//!
//! The aggregator runs every scenario for the configured repeat count,
//! strictly sequentially (overlapping trials would contaminate each other's
//! evidence), records each outcome, and logs throttled per-trial timing the
//! way long soak runs need: one entry per `max(1, trials / 100)` trials.
//!
//! The report groups outcomes by reproducibility tag. A failure in a
//! scenario tagged reproducible flips the run verdict to `KO!`; failures in
//! not-reproducible scenarios are expected noise and are only tallied.
//! Individual trial failures are never propagated as errors; repetition
//! across independent trials is itself the retry mechanism, and the report
//! is the only channel that communicates failures.
//!
//! Rendering is deterministic: groups are BTree-ordered, so identical
//! outcomes produce byte-identical reports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::config::HarnessConfig;
use crate::observability::{LogCollector, LogEntry};
use crate::pool::PoolPair;
use crate::scenario::{ReproTag, Scenario};
use crate::trial::{Trial, TrialVerdict};

/// Placeholder rendered for an empty scenario or failure set.
pub const NONE_PLACEHOLDER: &str = "<NONE>";

/// Scenario names and failure counts for one reproducibility tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagGroup {
    /// Every scenario carrying this tag.
    pub scenarios: BTreeSet<String>,
    /// Failure count per scenario that failed at least once.
    pub failures: BTreeMap<String, u64>,
}

impl TagGroup {
    fn record_scenario(&mut self, name: &str) {
        self.scenarios.insert(name.to_string());
    }

    fn record_failure(&mut self, name: &str) {
        *self.failures.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Aggregated outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Total trials executed.
    pub total: u64,
    /// Trials whose observation matched their scenario's assertion.
    pub passed: u64,
    /// Trials whose observation did not.
    pub failed: u64,
    /// Scenarios expected to hold on every repetition.
    pub reproducible: TagGroup,
    /// Scenarios whose assertion depends on scheduling luck.
    pub not_reproducible: TagGroup,
}

impl Report {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scenario under its tag, so the report lists scenarios
    /// that never failed as well.
    pub fn register_scenario(&mut self, name: &str, tag: ReproTag) {
        self.group_mut(tag).record_scenario(name);
    }

    /// Records one trial outcome.
    pub fn record(&mut self, scenario: &str, tag: ReproTag, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
            self.group_mut(tag).record_failure(scenario);
        }
    }

    fn group_mut(&mut self, tag: ReproTag) -> &mut TagGroup {
        match tag {
            ReproTag::Reproducible => &mut self.reproducible,
            ReproTag::NotReproducible => &mut self.not_reproducible,
        }
    }

    /// `true` when no reproducible scenario failed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reproducible.failures.is_empty()
    }

    /// The overall one-word verdict.
    #[must_use]
    pub fn verdict(&self) -> &'static str {
        if self.is_ok() {
            "OK."
        } else {
            "KO!"
        }
    }
}

fn fmt_names(names: &BTreeSet<String>) -> String {
    if names.is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }
    let joined = names.iter().cloned().collect::<Vec<_>>().join(", ");
    format!("[{joined}]")
}

fn fmt_counts(counts: &BTreeMap<String, u64>) -> String {
    if counts.is_empty() {
        return NONE_PLACEHOLDER.to_string();
    }
    let joined = counts
        .iter()
        .map(|(name, count)| format!("{name}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "____poolwitness done({} trials, {} passed, {} failed), {}____",
            self.total,
            self.passed,
            self.failed,
            self.verdict()
        )?;
        writeln!(f, "Scenarios expected to be reproducible")?;
        writeln!(f, "\t{}", fmt_names(&self.reproducible.scenarios))?;
        writeln!(f, "\tbut failed:")?;
        writeln!(f, "\t{}", fmt_counts(&self.reproducible.failures))?;
        writeln!(f, "Scenarios known to be non-reproducible")?;
        writeln!(f, "\t{}", fmt_names(&self.not_reproducible.scenarios))?;
        writeln!(f, "\tand did fail:")?;
        write!(f, "\t{}", fmt_counts(&self.not_reproducible.failures))
    }
}

/// Sequential trial driver over a scenario set.
#[derive(Debug)]
pub struct Aggregator<'a> {
    config: &'a HarnessConfig,
    pools: &'a PoolPair,
}

impl<'a> Aggregator<'a> {
    /// An aggregator borrowing the run's config and its two shared pools.
    #[must_use]
    pub fn new(config: &'a HarnessConfig, pools: &'a PoolPair) -> Self {
        Self { config, pools }
    }

    /// Runs every scenario `config.trials` times and builds the report.
    pub fn run(&self, scenarios: &[Scenario], log: &mut LogCollector) -> Report {
        let mut report = Report::new();
        let log_every = u64::from(self.config.trials / 100).max(1);
        let mut trial_number: u64 = 0;

        for scenario in scenarios {
            report.register_scenario(scenario.name, scenario.tag);
            let mut failures_here: u64 = 0;

            for _ in 0..self.config.trials {
                trial_number += 1;
                let started = Instant::now();
                let outcome = Trial::new(scenario.clone()).run(self.pools, self.config.stream_size);
                let took = started.elapsed();

                report.record(outcome.scenario, outcome.tag, outcome.passed);
                if !outcome.passed {
                    failures_here += 1;
                }

                match &outcome.verdict {
                    TrialVerdict::ChecksumMismatch { expected, actual } => {
                        log.collect(
                            LogEntry::error("checksum mismatch")
                                .with_field("scenario", outcome.scenario)
                                .with_field("expected", expected.to_string())
                                .with_field("actual", actual.to_string()),
                        );
                    }
                    TrialVerdict::Aborted { error } => {
                        log.collect(
                            LogEntry::error("trial aborted")
                                .with_field("scenario", outcome.scenario)
                                .with_field("error", error.to_string()),
                        );
                    }
                    TrialVerdict::Witnessed { .. } => {}
                }

                // Throttled timing log; unthrottled output makes long soak
                // runs slower and noisier the longer they run.
                if trial_number % log_every == 0 {
                    log.collect(
                        LogEntry::debug("trial completed")
                            .with_field("scenario", outcome.scenario)
                            .with_field("trial", trial_number.to_string())
                            .with_field("took", format!("{took:.3?}"))
                            .with_field("passed", outcome.passed.to_string()),
                    );
                }
            }

            log.collect(
                LogEntry::info("scenario completed")
                    .with_field("scenario", scenario.name)
                    .with_field("tag", scenario.tag.to_string())
                    .with_field("trials", self.config.trials.to_string())
                    .with_field("failures", failures_here.to_string()),
            );
        }

        report
    }
}
