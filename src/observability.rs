//! Structured logging for the trial driver.
//!
//! The library never writes to stdout or stderr; the aggregator logs
//! structured entries into a bounded collector, and the CLI decides what to
//! render. Entries carry a severity level, a message, and bounded key-value
//! fields; the collector stamps each accepted entry with the elapsed time
//! since the collector was created.

use core::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Maximum number of fields on one entry.
const MAX_FIELDS: usize = 16;

/// Severity level for log entries.
///
/// Levels are ordered `Trace < Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    /// Detailed per-trial tracing.
    Trace,
    /// Debugging information.
    Debug,
    /// General progress (default).
    #[default]
    Info,
    /// Unexpected-but-tolerated conditions.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// Returns `true` if an entry at this level passes the threshold.
    #[must_use]
    pub fn is_enabled_at(self, threshold: Self) -> bool {
        self >= threshold
    }
}

impl LogLevel {
    /// The uppercase level name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// A structured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    level: LogLevel,
    message: String,
    fields: Vec<(String, String)>,
    elapsed: Duration,
}

impl LogEntry {
    /// Creates an entry at the given level.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            fields: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// An INFO entry.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    /// A DEBUG entry.
    #[must_use]
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    /// A WARN entry.
    #[must_use]
    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, message)
    }

    /// An ERROR entry.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    /// Adds a key-value field. Fields past the bound are dropped.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if self.fields.len() < MAX_FIELDS {
            self.fields.push((key.into(), value.into()));
        }
        self
    }

    /// The entry's level.
    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// The entry's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The entry's fields.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>10.3?}] {:<5} {}",
            self.elapsed, self.level, self.message
        )?;
        for (key, value) in &self.fields {
            write!(f, " {key}={value}")?;
        }
        Ok(())
    }
}

/// A bounded collector of log entries with level filtering.
#[derive(Debug)]
pub struct LogCollector {
    entries: Vec<LogEntry>,
    capacity: usize,
    min_level: LogLevel,
    started: Instant,
    total_received: u64,
    total_dropped: u64,
}

impl LogCollector {
    /// A collector retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(1024)),
            capacity,
            min_level: LogLevel::Trace,
            started: Instant::now(),
            total_received: 0,
            total_dropped: 0,
        }
    }

    /// Sets the minimum level to retain.
    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Accepts an entry, stamping it with the collector's elapsed time.
    ///
    /// Entries below the level threshold are counted and discarded; entries
    /// past capacity are counted as dropped.
    pub fn collect(&mut self, mut entry: LogEntry) {
        self.total_received += 1;
        if !entry.level.is_enabled_at(self.min_level) {
            return;
        }
        if self.entries.len() >= self.capacity {
            self.total_dropped += 1;
            return;
        }
        entry.elapsed = self.started.elapsed();
        self.entries.push(entry);
    }

    /// The retained entries, in collection order.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries received (including filtered and dropped).
    #[must_use]
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Number of entries dropped for capacity.
    #[must_use]
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Error.is_enabled_at(LogLevel::Info));
        assert!(LogLevel::Info.is_enabled_at(LogLevel::Info));
        assert!(!LogLevel::Debug.is_enabled_at(LogLevel::Info));
    }

    #[test]
    fn level_parsing_accepts_aliases() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn collector_filters_below_threshold() {
        let mut collector = LogCollector::new(8).with_min_level(LogLevel::Info);
        collector.collect(LogEntry::debug("ignored"));
        collector.collect(LogEntry::info("kept"));
        assert_eq!(collector.entries().len(), 1);
        assert_eq!(collector.entries()[0].message(), "kept");
        assert_eq!(collector.total_received(), 2);
    }

    #[test]
    fn collector_counts_capacity_drops() {
        let mut collector = LogCollector::new(1);
        collector.collect(LogEntry::info("first"));
        collector.collect(LogEntry::info("second"));
        assert_eq!(collector.entries().len(), 1);
        assert_eq!(collector.total_dropped(), 1);
    }

    #[test]
    fn entry_renders_fields() {
        let entry = LogEntry::info("trial done").with_field("scenario", "control");
        let rendered = entry.to_string();
        assert!(rendered.contains("trial done"));
        assert!(rendered.contains("scenario=control"));
    }
}
