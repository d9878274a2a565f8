//! Portico logging.
//!
//! Lightweight structured logging shared by every Portico crate. Output goes
//! to stderr in one of three formats and is filtered by a global level that
//! can be set from the environment or at runtime.
//!
//! # Usage
//!
//! ```rust
//! use portico_log::{debug, info, warn};
//!
//! info!("application booted");
//! debug!(target: "portico::boot", "booting {}", "http");
//! warn!("host {} not allowed", "evil.example.com");
//! ```
//!
//! # Environment Variables
//!
//! - `PORTICO_DEBUG=1` - enable debug logging
//! - `PORTICO_LOG=trace|debug|info|warn|error|off` - minimum level
//! - `PORTICO_LOG_FORMAT=pretty|compact|json` - output format
//! - `PORTICO_LOG_TIMESTAMPS=0` - drop timestamps

use once_cell::sync::Lazy;
use std::env;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl Level {
    /// Upper-case level name as printed in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Off => "OFF",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            4 => Level::Error,
            _ => Level::Off,
        }
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level or format name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError(pub String);

impl fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log setting '{}'", self.0)
    }
}

impl std::error::Error for ParseLevelError {}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Format {
    /// `2026-01-01 10:00:00.000 INFO  [target] message`
    Pretty = 0,
    /// `10:00:00 I target: message`
    Compact = 1,
    /// One JSON object per line.
    Json = 2,
}

impl FromStr for Format {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);
static FORMAT: AtomicU8 = AtomicU8::new(Format::Pretty as u8);
static TIMESTAMPS: AtomicBool = AtomicBool::new(true);

static FROM_ENV: Lazy<LogConfig> = Lazy::new(|| {
    let config = LogConfig::from_env();
    config.apply();
    config
});

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: Format,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Pretty,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read the `PORTICO_*` environment variables.
    pub fn from_env() -> Self {
        let debug = env::var("PORTICO_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let level = env::var("PORTICO_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("PORTICO_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Pretty);

        let timestamps = env::var("PORTICO_LOG_TIMESTAMPS")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        Self {
            level,
            format,
            timestamps,
        }
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Install this configuration globally.
    pub fn apply(&self) {
        LEVEL.store(self.level as u8, Ordering::SeqCst);
        FORMAT.store(self.format as u8, Ordering::SeqCst);
        TIMESTAMPS.store(self.timestamps, Ordering::SeqCst);
    }
}

/// Load the environment configuration once. Called lazily by the first
/// emitted line; call it early to pick up the environment eagerly.
pub fn init() {
    Lazy::force(&FROM_ENV);
}

/// Replace the active configuration.
pub fn configure(config: LogConfig) {
    Lazy::force(&FROM_ENV);
    config.apply();
}

pub fn set_level(level: Level) {
    Lazy::force(&FROM_ENV);
    LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn current_level() -> Level {
    Level::from_u8(LEVEL.load(Ordering::Relaxed))
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= LEVEL.load(Ordering::Relaxed)
}

fn current_format() -> Format {
    match FORMAT.load(Ordering::Relaxed) {
        1 => Format::Compact,
        2 => Format::Json,
        _ => Format::Pretty,
    }
}

/// Emit a log line. Used by the macros.
#[doc(hidden)]
pub fn log(level: Level, target: &str, message: fmt::Arguments<'_>) {
    Lazy::force(&FROM_ENV);
    if !is_level_enabled(level) {
        return;
    }

    let line = render(level, target, message, current_format(), TIMESTAMPS.load(Ordering::Relaxed));
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
}

fn render(
    level: Level,
    target: &str,
    message: fmt::Arguments<'_>,
    format: Format,
    timestamps: bool,
) -> String {
    match format {
        Format::Pretty => {
            let mut line = String::new();
            if timestamps {
                line.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            line.push_str(&format!("{:5} ", level.as_str()));
            if !target.is_empty() {
                line.push_str(&format!("[{}] ", target));
            }
            line.push_str(&message.to_string());
            line
        }
        Format::Compact => {
            let mut line = String::new();
            if timestamps {
                line.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
            }
            line.push(level.as_str().chars().next().unwrap_or('?'));
            line.push(' ');
            if !target.is_empty() {
                line.push_str(target);
                line.push_str(": ");
            }
            line.push_str(&message.to_string());
            line
        }
        Format::Json => {
            let mut entry = serde_json::Map::new();
            if timestamps {
                entry.insert("timestamp".into(), chrono::Utc::now().to_rfc3339().into());
            }
            entry.insert("level".into(), level.as_str().into());
            entry.insert("target".into(), target.into());
            entry.insert("message".into(), message.to_string().into());
            serde_json::Value::Object(entry).to_string()
        }
    }
}

#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::log($crate::Level::Trace, $target, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::log($crate::Level::Trace, module_path!(), format_args!($($arg)+))
    };
}

/// Log at debug level.
///
/// ```rust
/// use portico_log::debug;
///
/// let route = "blog/{id}";
/// debug!(target: "portico::router", "matched {}", route);
/// ```
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::log($crate::Level::Debug, $target, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::log($crate::Level::Debug, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::log($crate::Level::Info, $target, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::log($crate::Level::Info, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::log($crate::Level::Warn, $target, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::log($crate::Level::Warn, module_path!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::log($crate::Level::Error, $target, format_args!($($arg)+))
    };
    ($($arg:tt)+) => {
        $crate::log($crate::Level::Error, module_path!(), format_args!($($arg)+))
    };
}
