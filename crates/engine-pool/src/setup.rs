//! Helpers for one-time engine setup
//!
//! Factories typically extend the interpreter's module search path during
//! [`EngineFactory::setup`](crate::EngineFactory::setup) so pooled engines can
//! load the host's scripts. [`SearchPath`] edits such a path without the
//! factory having to juggle separators by hand.

use std::fmt;

/// Pattern for the host's own script directory.
pub const DEFAULT_SCRIPT_PATTERN: &str = "luascripts/?.lua";

const SEPARATOR: char = ';';

/// An interpreter module search path: `;`-separated lookup patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    patterns: Vec<String>,
}

impl SearchPath {
    /// Parse an existing search path string. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self {
            patterns: path
                .split(SEPARATOR)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Append `pattern` unless it is already present.
    ///
    /// Returns whether the path changed.
    pub fn push(&mut self, pattern: impl Into<String>) -> bool {
        let pattern = pattern.into();
        if pattern.is_empty() || self.patterns.contains(&pattern) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    /// Append [`DEFAULT_SCRIPT_PATTERN`].
    pub fn with_default_scripts(mut self) -> Self {
        self.push(DEFAULT_SCRIPT_PATTERN);
        self
    }

    /// Lookup patterns in search order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(pattern)?;
        }
        Ok(())
    }
}
