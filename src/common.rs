// Licensed under the Apache-2.0 license

//! Logging hooks shared by the drivers in this crate.
//!
//! Drivers take a `L: Logger` type parameter defaulting to [`NoOpLogger`], so a
//! production build pays nothing for diagnostics it does not ask for.

use core::fmt::{self, Write};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Warn,
    Error,
}

impl Level {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

pub trait Logger {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn log(&mut self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Writes one line per record to any `core::fmt::Write` sink, typically a UART.
pub struct FmtLogger<W: Write> {
    sink: W,
    min_level: Level,
}

impl<W: Write> FmtLogger<W> {
    pub fn new(sink: W, min_level: Level) -> Self {
        Self { sink, min_level }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> Logger for FmtLogger<W> {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        // A failing sink has nowhere to report to.
        let _ = write!(self.sink, "[{}] ", level.as_str());
        let _ = self.sink.write_fmt(args);
        let _ = self.sink.write_str("\r\n");
    }
}

impl<L: Logger> Logger for &mut L {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        (**self).log(level, args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_logger_filters_below_min_level() {
        let mut logger = FmtLogger::new(String::new(), Level::Warn);
        logger.debug(format_args!("hidden"));
        logger.warn(format_args!("clock {} Hz", 8_000_000));
        logger.error(format_args!("timeout"));

        let out = logger.into_inner();
        assert_eq!(out, "[WARN] clock 8000000 Hz\r\n[ERROR] timeout\r\n");
    }

    #[test]
    fn logger_by_mutable_reference() {
        fn emit<L: Logger>(mut logger: L) {
            logger.debug(format_args!("init"));
        }

        let mut logger = FmtLogger::new(String::new(), Level::Debug);
        emit(&mut logger);
        assert_eq!(logger.into_inner(), "[DEBUG] init\r\n");
    }
}
