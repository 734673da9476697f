//! Error types for the reduction and checksum paths.
//!
//! Errors here are arithmetic: a reduction whose sum overflows is no longer
//! evidence of anything, so overflow aborts the trial that produced it.
//! Trial-level failures (checksum mismatch, evidence violations) are not
//! errors; they are recorded as verdicts and surface only in the final
//! report.

use core::fmt;

use serde::Serialize;

/// A convenient `Result` alias for reduction operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Arithmetic failure inside a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Error {
    /// The running sum overflowed `u64` while folding or combining.
    ///
    /// Carries the inclusive interval whose fold or combine overflowed.
    SumOverflow {
        /// Lower bound of the offending interval.
        lo: u64,
        /// Upper bound of the offending interval.
        hi: u64,
    },
    /// The closed-form checksum `n * (n + 1) / 2` overflowed `u64`.
    ChecksumOverflow {
        /// The range size whose checksum could not be represented.
        n: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SumOverflow { lo, hi } => {
                write!(f, "sum overflowed u64 while reducing [{lo}, {hi}]")
            }
            Self::ChecksumOverflow { n } => {
                write!(f, "checksum n*(n+1)/2 overflowed u64 for n = {n}")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_interval() {
        let err = Error::SumOverflow { lo: 7, hi: 9 };
        assert_eq!(err.to_string(), "sum overflowed u64 while reducing [7, 9]");
    }

    #[test]
    fn display_names_the_checksum_size() {
        let err = Error::ChecksumOverflow { n: u64::MAX };
        assert!(err.to_string().contains("n*(n+1)/2"));
    }
}
