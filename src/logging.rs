use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::OnceLock;

// Custom logger structure
#[derive(Debug)]
struct TankMazeLogger {
    level: LevelFilter,
    debug_filters: Option<HashSet<String>>,
}

// Implement the log::Log trait for our custom logger
impl log::Log for TankMazeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() <= self.level {
            // Debug/trace records must match a topic filter when one is set
            if let Some(filters) = &self.debug_filters {
                if metadata.level() == log::Level::Debug || metadata.level() == log::Level::Trace {
                    return filters.contains(metadata.target())
                        || filters.iter().any(|f| metadata.target().starts_with(f));
                }
            }
            return true;
        }
        false
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level_color = match record.level() {
                log::Level::Error => "\x1B[31m", // Red
                log::Level::Warn => "\x1B[33m",  // Yellow
                log::Level::Info => "\x1B[32m",  // Green
                log::Level::Debug => "\x1B[36m", // Cyan
                log::Level::Trace => "\x1B[35m", // Magenta
            };
            let reset = "\x1B[0m";
            let timestamp = Local::now().format("%H:%M:%S%.3f");

            let mut stdout = io::stdout();
            writeln!(
                stdout,
                "{timestamp} {level_color}{level:5}{reset} {target}: {message}",
                timestamp = timestamp,
                level_color = level_color,
                level = record.level(),
                reset = reset,
                target = record.target(),
                message = record.args()
            )
            .expect("Failed to write to stdout");
            stdout.flush().expect("Failed to flush stdout");
        }
    }

    fn flush(&self) {
        io::stdout().flush().expect("Failed to flush stdout");
    }
}

static LOGGER: OnceLock<TankMazeLogger> = OnceLock::new();

/// Initialize the logger. `debug_filter` is a comma-separated list of debug
/// topics (grid, path, collision, pilot, tank); when present, debug output
/// is limited to those topics.
pub fn init_logger(level: LevelFilter, debug_filter: Option<String>) -> Result<(), SetLoggerError> {
    let debug_filters = debug_filter.map(|filter_str| {
        filter_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect::<HashSet<String>>()
    });

    if LOGGER.get().is_none() {
        let logger = TankMazeLogger {
            level,
            debug_filters,
        };
        LOGGER.set(logger).expect("Failed to set logger");
    }

    log::set_logger(LOGGER.get().unwrap()).map(|()| log::set_max_level(level))
}

// Helper macros for specific debug topics

#[macro_export]
macro_rules! debug_grid {
    ($($arg:tt)*) => {
        log::debug!(target: "grid", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_path {
    ($($arg:tt)*) => {
        log::debug!(target: "path", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_collision {
    ($($arg:tt)*) => {
        log::debug!(target: "collision", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_pilot {
    ($id:expr, $tick:expr, $($arg:tt)*) => {
        log::debug!(target: "pilot", "[E{:03}][T{:06}] {}", $id, $tick, format_args!($($arg)*))
    };
    ($($arg:tt)*) => {
        log::debug!(target: "pilot", "{}", format_args!($($arg)*))
    }
}

#[macro_export]
macro_rules! debug_tank {
    ($id:expr, $tick:expr, $($arg:tt)*) => {
        log::debug!(target: "tank", "[E{:03}][T{:06}] {}", $id, $tick, format_args!($($arg)*))
    };
    ($($arg:tt)*) => {
        log::debug!(target: "tank", "{}", format_args!($($arg)*))
    }
}
