// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logging output backends.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::str::FromStr;

/// Severity of a record; records below the logger's level are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Registrations, bindings, per-request failures.
    Debug = 0,
    /// Session open and close.
    Info = 1,
    /// Orphaned responses, unmatched exceptions, cache growth.
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    /// Fixed-width tag used by [`ConsoleOutput`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warning => "WARN ",
            Self::Error => "ERROR",
        }
    }

    fn to_log(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Destination of formatted log records.
///
/// Shared by every component of a connection, so it must be thread-safe.
pub trait Output: Send + Sync {
    /// Write one record.
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()>;

    /// Flush buffered records.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Forwards to the `log` facade under the `simlink` target.
#[derive(Debug, Default)]
pub struct LogCrateOutput;

impl Output for LogCrateOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        log::log!(target: "simlink", level.to_log(), "{}", message);
        Ok(())
    }
}

/// One line per record on stderr, prefixed with the level tag.
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "[{}] {}", level.as_str(), message)
    }

    fn flush(&self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().clone()
    }

    /// True if any record at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Output for MemoryOutput {
    fn write(&self, level: LogLevel, message: &str) -> io::Result<()> {
        self.records.lock().push((level, message.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_and_parsing() {
        assert!(LogLevel::Debug < LogLevel::Error);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(" info ".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn memory_output_captures() {
        let out = MemoryOutput::new();
        out.write(LogLevel::Warning, "dropped response #4").unwrap();
        assert!(out.contains(LogLevel::Warning, "#4"));
        assert!(!out.contains(LogLevel::Error, "#4"));
        assert_eq!(out.records().len(), 1);
    }
}
