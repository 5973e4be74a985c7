// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Injectable logging.
//!
//! Components receive a [`Logger`] when they are built instead of reaching
//! for a process-wide instance. A logger is a level filter in front of an
//! [`Output`]; the default output forwards to the `log` facade.
//!
//! ```rust
//! use simlink::logging::{Logger, LogLevel, MemoryOutput};
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryOutput::new());
//! let log = Logger::new(memory.clone(), LogLevel::Info);
//! log.debug(format_args!("filtered out"));
//! log.warn(format_args!("orphaned response {}", 7));
//! assert_eq!(memory.records().len(), 1);
//! ```

mod output;

pub use output::{ConsoleOutput, LogCrateOutput, LogLevel, MemoryOutput, Output};

use std::fmt;
use std::sync::Arc;

/// Level-filtered handle to an output.
#[derive(Clone)]
pub struct Logger {
    output: Arc<dyn Output>,
    level: LogLevel,
}

impl Logger {
    pub fn new(output: Arc<dyn Output>, level: LogLevel) -> Self {
        Self { output, level }
    }

    /// Logger forwarding to the `log` facade.
    pub fn log_crate(level: LogLevel) -> Self {
        Self::new(Arc::new(LogCrateOutput), level)
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        // Output failures are not worth failing a request over.
        let _ = self.output.write(level, &args.to_string());
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Warning, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }

    pub fn flush(&self) {
        let _ = self.output.flush();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::log_crate(LogLevel::Info)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}
