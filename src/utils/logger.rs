use std::fmt::Display;
use std::time::SystemTime;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

const RESET: &str = "\x1b[0m";
const BLUE: &str = "\x1b[34m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

const TARGET: &str = "anima";

#[macro_export]
macro_rules! log_info {
    ($msg:expr) => {
        $crate::Logger::log(
            $crate::LogLevel::Info,
            &$msg.to_string()
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Logger::log(
            $crate::LogLevel::Info,
            &format!($fmt, $($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_debug {
    ($msg:expr) => {
        $crate::Logger::log(
            $crate::LogLevel::Debug,
            &$msg.to_string()
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Logger::log(
            $crate::LogLevel::Debug,
            &format!($fmt, $($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_warn {
    ($msg:expr) => {
        $crate::Logger::log(
            $crate::LogLevel::Warning,
            &$msg.to_string()
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Logger::log(
            $crate::LogLevel::Warning,
            &format!($fmt, $($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_error {
    ($msg:expr) => {
        $crate::Logger::log(
            $crate::LogLevel::Error,
            &$msg.to_string()
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Logger::log(
            $crate::LogLevel::Error,
            &format!($fmt, $($arg)*)
        )
    };
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Level {
        match level {
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warning => Level::Warn,
            LogLevel::Error => Level::Error,
        }
    }
}

/// Library diagnostics go through the `log` facade, so the embedding application
/// decides where they end up. `Logger` is also a ready-made `log` backend that
/// prints timestamped, colored lines to stderr.
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Installs a `Logger` as the global `log` backend.
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(Logger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    fn get_timestamp() -> String {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();

        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs / 60) % 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    pub fn log(level: LogLevel, message: impl Display) {
        log::log!(target: TARGET, Level::from(level), "{}", message);
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (level_str, color) = match record.level() {
            Level::Trace | Level::Debug => ("DEBUG", BLUE),
            Level::Info => ("INFO ", GREEN),
            Level::Warn => ("WARN ", YELLOW),
            Level::Error => ("ERROR", RED),
        };

        eprintln!(
            "{} | {}{:5}{}| {}",
            Self::get_timestamp(),
            color,
            level_str,
            RESET,
            record.args()
        );
    }

    fn flush(&self) {}
}
