/// Structured logging backend.
///
/// Library code logs through the `log` macros with a target naming the
/// component (`list`, `store`, `qc`, `db`, `config`). This module
/// supplies the backend: severity filtering, component tags, optional
/// console timestamps and append-to-file output for long-running
/// processing jobs.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warning,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug | log::Level::Trace => LogLevel::Debug,
        }
    }
}

impl LogLevel {
    fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    List,
    Store,
    Qc,
    Database,
    Config,
    System,
}

impl Component {
    /// The component a log target belongs to. Targets from other crates
    /// are reported as SYS.
    pub fn from_target(target: &str) -> Self {
        match target.rsplit("::").next().unwrap_or(target) {
            "list" => Component::List,
            "store" => Component::Store,
            "qc" => Component::Qc,
            "db" => Component::Database,
            "config" => Component::Config,
            _ => Component::System,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::List => write!(f, "LIST"),
            Component::Store => write!(f, "STORE"),
            Component::Qc => write!(f, "QC"),
            Component::Database => write!(f, "DB"),
            Component::Config => write!(f, "CFG"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    pub fn new(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) -> Self {
        Logger {
            min_level,
            log_file,
            console_timestamps,
        }
    }

    /// Full entry as written to the log file.
    fn file_entry(level: LogLevel, component: Component, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!("{} {} {}: {}", timestamp, level, component, message)
    }

    /// Console line, or `None` if the level is not shown on the console.
    fn console_line(&self, level: LogLevel, component: Component, message: &str) -> Option<String> {
        if self.console_timestamps {
            return Some(match level {
                LogLevel::Error | LogLevel::Warning => {
                    Self::file_entry(level, component, message)
                }
                LogLevel::Info => format!("   {}", message),
                LogLevel::Debug => format!("   [DEBUG] {}: {}", component, message),
            });
        }

        match level {
            LogLevel::Error => Some(format!("   ✗ {}: {}", component, message)),
            LogLevel::Warning => Some(format!("   ⚠ {}: {}", component, message)),
            LogLevel::Info => Some(format!("   {}", message)),
            LogLevel::Debug => None,
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        LogLevel::from(metadata.level()) >= self.min_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = LogLevel::from(record.level());
        let component = Component::from_target(record.target());
        let message = record.args().to_string();

        if let Some(line) = self.console_line(level, component, &message) {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", line),
                LogLevel::Info | LogLevel::Debug => println!("{}", line),
            }
        }

        if let Some(ref path) = self.log_file {
            let entry = Self::file_entry(level, component, &message);
            if let Err(e) = Self::append_to_file(path, &entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn flush(&self) {}
}

// ---------------------------------------------------------------------------
// Installation
// ---------------------------------------------------------------------------

/// Installs the logger as the `log` backend. Only the first call has any
/// effect; returns whether this call installed it.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) -> bool {
    let logger = Logger::new(min_level, log_file.map(String::from), console_timestamps);
    match log::set_boxed_logger(Box::new(logger)) {
        Ok(()) => {
            log::set_max_level(min_level.to_filter());
            true
        }
        Err(_) => false,
    }
}

/// Installs the logger from the `[logging]` configuration section.
pub fn init_from_config(config: &crate::config::LoggingConfig) -> bool {
    init_logger(config.level, config.file.as_deref(), config.console_timestamps)
}
