//! Error types for the engine pool
use std::sync::Arc;

use thiserror::Error;

/// Result type for pool and engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Shared, cloneable underlying cause.
pub type Source = Arc<dyn std::error::Error + Send + Sync>;

/// Error type for every pool, handle and engine operation.
///
/// The type is `Clone` so a failed [`Conn`](crate::Conn) can return the same
/// error from every call made on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Non-blocking pool has every engine checked out
    #[error("engine pool exhausted: {active}/{max_active} engines in use")]
    PoolExhausted {
        /// Engines currently created (idle + checked out)
        active: usize,
        /// Configured maximum number of active engines
        max_active: usize,
    },

    /// Acquisition on a pool that was closed, or a waiter woken by close
    #[error("get on closed engine pool")]
    PoolClosed,

    /// The factory failed to create or set up a new engine
    #[error("engine creation failed: {reason}")]
    Creation {
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Source>,
    },

    /// Call attempted on a handle that was already closed
    #[error("engine handle closed")]
    HandleClosed,

    /// Closing an engine failed
    #[error("engine close failed: {reason}")]
    Close {
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<Source>,
    },

    /// Waiting for a permit took longer than the configured timeout
    #[error("engine acquire timed out after {timeout_ms}ms")]
    AcquireTimeout {
        /// The timeout in milliseconds
        timeout_ms: u64,
    },

    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// An engine command returned an error reply
    #[error("engine call '{command}' failed: {reason}")]
    Call {
        /// The command that was executed
        command: String,
        /// The error reported by the engine
        reason: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an engine creation error without an underlying cause
    pub fn creation<S: Into<String>>(reason: S) -> Self {
        Self::Creation {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create an engine creation error wrapping `source`
    pub fn creation_with_source<S, E>(reason: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Creation {
            reason: reason.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create an engine close error
    pub fn close<S: Into<String>>(reason: S) -> Self {
        Self::Close {
            reason: reason.into(),
            source: None,
        }
    }

    /// Create a command error reply
    pub fn call<C: Into<String>, R: Into<String>>(command: C, reason: R) -> Self {
        Self::Call {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Check if retrying the same request may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::AcquireTimeout { .. })
    }

    /// Check if this error means the pool or handle is closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::PoolClosed | Self::HandleClosed)
    }
}
