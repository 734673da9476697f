//! Run configuration with environment overrides.
//!
//! # Precedence
//!
//! Settings resolve in this order (highest priority first):
//!
//! 1. **CLI flags**: applied by the binary after env overrides
//! 2. **Environment variables**: `POOLWITNESS_*`
//! 3. **Defaults**: [`HarnessConfig::default`]
//!
//! # Supported environment variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `POOLWITNESS_TRIALS` | `u32` | `trials` |
//! | `POOLWITNESS_STREAM_SIZE` | `u64` | `stream_size` |
//! | `POOLWITNESS_PARALLELISM` | `usize` | `parallelism` |
//! | `POOLWITNESS_LOG` | level name | `log_level` |

use core::fmt;
use std::str::FromStr;

use crate::observability::LogLevel;
use crate::pool::default_parallelism;

/// Environment variable name for the per-scenario trial count.
pub const ENV_TRIALS: &str = "POOLWITNESS_TRIALS";
/// Environment variable name for the per-trial range size.
pub const ENV_STREAM_SIZE: &str = "POOLWITNESS_STREAM_SIZE";
/// Environment variable name for the per-pool worker count.
pub const ENV_PARALLELISM: &str = "POOLWITNESS_PARALLELISM";
/// Environment variable name for the log level.
pub const ENV_LOG_LEVEL: &str = "POOLWITNESS_LOG";

/// Effective configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Repetitions of every scenario.
    pub trials: u32,
    /// Range size per trial: the reduction spans `[1, stream_size]`. The
    /// bigger, the more likely the scheduler actually splits work into the
    /// pool.
    pub stream_size: u64,
    /// Worker count for each of the two pools.
    pub parallelism: usize,
    /// Minimum level retained by the run's log collector.
    pub log_level: LogLevel,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            stream_size: 100,
            parallelism: default_parallelism(),
            log_level: LogLevel::Info,
        }
    }
}

/// A configuration value that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An override was set but unparseable.
    InvalidValue {
        /// The variable (or flag) that held the value.
        var: &'static str,
        /// The raw value.
        value: String,
        /// Why it did not parse.
        reason: String,
    },
    /// A value parsed but is outside its valid range.
    OutOfRange {
        /// The variable (or flag) that held the value.
        var: &'static str,
        /// What the constraint is.
        constraint: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { var, value, reason } => {
                write!(f, "invalid value for {var}: {value:?} ({reason})")
            }
            Self::OutOfRange { var, constraint } => {
                write!(f, "value for {var} out of range: {constraint}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Applies `POOLWITNESS_*` environment overrides to `config`.
///
/// Only variables that are set are applied.
///
/// # Errors
///
/// Returns an error if a variable is set but unparseable or out of range.
pub fn apply_env_overrides(config: &mut HarnessConfig) -> Result<(), ConfigError> {
    apply_overrides_from(config, |var| std::env::var(var).ok())
}

/// [`apply_env_overrides`] with an injected lookup, so override handling is
/// testable without touching process-global state.
pub fn apply_overrides_from(
    config: &mut HarnessConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(ENV_TRIALS) {
        config.trials = parse(ENV_TRIALS, &value)?;
    }
    if let Some(value) = lookup(ENV_STREAM_SIZE) {
        config.stream_size = parse(ENV_STREAM_SIZE, &value)?;
        if config.stream_size == 0 {
            return Err(ConfigError::OutOfRange {
                var: ENV_STREAM_SIZE,
                constraint: "must be at least 1",
            });
        }
    }
    if let Some(value) = lookup(ENV_PARALLELISM) {
        config.parallelism = parse(ENV_PARALLELISM, &value)?;
        if config.parallelism == 0 {
            return Err(ConfigError::OutOfRange {
                var: ENV_PARALLELISM,
                constraint: "must be at least 1",
            });
        }
    }
    if let Some(value) = lookup(ENV_LOG_LEVEL) {
        config.log_level = parse(ENV_LOG_LEVEL, &value)?;
    }
    Ok(())
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|err: T::Err| ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_of<'a>(pairs: &'a [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            pairs
                .iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn unset_variables_leave_defaults() {
        let mut config = HarnessConfig::default();
        apply_overrides_from(&mut config, |_| None).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let mut config = HarnessConfig::default();
        apply_overrides_from(
            &mut config,
            lookup_of(&[
                (ENV_TRIALS, "500"),
                (ENV_STREAM_SIZE, "20000000"),
                (ENV_PARALLELISM, "3"),
                (ENV_LOG_LEVEL, "debug"),
            ]),
        )
        .unwrap();
        assert_eq!(config.trials, 500);
        assert_eq!(config.stream_size, 20_000_000);
        assert_eq!(config.parallelism, 3);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn unparseable_value_is_an_error() {
        let mut config = HarnessConfig::default();
        let err = apply_overrides_from(&mut config, lookup_of(&[(ENV_TRIALS, "lots")]))
            .expect_err("must reject");
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == ENV_TRIALS));
    }

    #[test]
    fn zero_sized_stream_is_rejected() {
        let mut config = HarnessConfig::default();
        let err = apply_overrides_from(&mut config, lookup_of(&[(ENV_STREAM_SIZE, "0")]))
            .expect_err("must reject");
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }
}
