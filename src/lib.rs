//! Poolwitness: empirical verification that divide-and-conquer reductions
//! execute on their designated worker pool.
//!
//! # Overview
//!
//! Work-stealing substrates make a slippery promise: submit a parallel
//! reduction "to a pool" and the work runs… somewhere. The smallest
//! remaining chunk may run on the thread that submitted it; a
//! misconfigured substrate may run it on a different pool entirely. This
//! crate measures, across many repeated trials, how reproducibly a
//! reduction's work actually lands on a *specific* designated pool, and
//! distinguishes configurations expected to hold reliably from
//! configurations known not to.
//!
//! # How a trial works
//!
//! A trial splits `[1, N]` into a recursive parallel sum. Each leaf
//! classifies the thread it finds itself on (designated-pool worker, trial
//! caller, or anything else) and reports into two monotonic evidence flags
//! using relaxed stores; one acquire-fence read after the structural join
//! makes the flags safely readable. The sum is checked against
//! `N * (N + 1) / 2`, and the trial passes iff nothing ran in an
//! illegitimate context and the designated pool was used at least once.
//!
//! # Core guarantees
//!
//! - **Identity is observable**: every pool knows its workers' `ThreadId`s
//! - **Evidence is race-proof by monotonicity**: racing leaf writes can
//!   only agree on the final flag values
//! - **The fence comes after the join**: `finalize` is valid only once the
//!   reduction has structurally completed
//! - **The split grain is opaque**: tasks honor whatever the pool chooses,
//!   because the phenomenon under test lives in that choice
//!
//! # Module structure
//!
//! - [`pool`]: fixed-size worker pool with observable identity
//! - [`context`]: execution-context classifier
//! - [`evidence`]: monotonic evidence flags
//! - [`reduce`]: fork/join range reduction
//! - [`trial`]: single-trial harness
//! - [`scenario`]: scenario matrix and reproducibility tags
//! - [`report`]: repeated-trial aggregator and grouped report
//! - [`config`]: defaults and environment overrides
//! - [`observability`]: structured logging
//! - [`error`]: arithmetic error types

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod error;
pub mod evidence;
pub mod observability;
pub mod pool;
pub mod reduce;
pub mod report;
pub mod scenario;
pub mod trial;

pub use config::{apply_env_overrides, ConfigError, HarnessConfig};
pub use context::{classify, ExecutionContext};
pub use error::{Error, Result};
pub use evidence::{Evidence, EvidenceCollector};
pub use observability::{LogCollector, LogEntry, LogLevel};
pub use pool::{PoolHandle, PoolOptions, PoolPair, PoolRole, WorkerPool};
pub use reduce::{expected_sum, reduce_on};
pub use report::{Aggregator, Report};
pub use scenario::{builtin_scenarios, ReproTag, Rooting, Scenario};
pub use trial::{Trial, TrialOutcome, TrialVerdict};
