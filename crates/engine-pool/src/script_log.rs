//! Log bridge for scripts running inside pooled engines.
//!
//! Engines register [`emit`] (usually once per level) as native callables
//! during setup. Script log lines are routed through `tracing` under the
//! [`TARGET`] target so the host's subscriber decides where they go.

use std::fmt;
use std::str::FromStr;

use crate::engine::Value;
use crate::error::Error;

/// `tracing` target for script log lines.
pub const TARGET: &str = "engine_pool::script";

/// Severity of a script log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Informational output.
    Info,
    /// Something unexpected that the script recovered from.
    Warn,
    /// A failure reported by the script.
    Error,
}

impl LogLevel {
    /// Map the numeric level codes used by script-side log helpers
    /// (1 = info, 2 = warn, 3 = error).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Info),
            2 => Some(Self::Warn),
            3 => Some(Self::Error),
            _ => None,
        }
    }

    /// Lowercase name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(Error::configuration(format!(
                "unknown script log level '{other}'"
            ))),
        }
    }
}

/// Join script arguments into one tab-separated line.
///
/// Strings are written without quotes; every other value uses its JSON form.
pub fn join_args(args: &[Value]) -> String {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        match arg {
            Value::String(s) => line.push_str(s),
            other => line.push_str(&other.to_string()),
        }
    }
    line
}

/// Emit one script log line at `level`.
pub fn emit(level: LogLevel, args: &[Value]) {
    let message = join_args(args);
    match level {
        LogLevel::Info => tracing::info!(target: TARGET, "{message}"),
        LogLevel::Warn => tracing::warn!(target: TARGET, "{message}"),
        LogLevel::Error => tracing::error!(target: TARGET, "{message}"),
    }
}
