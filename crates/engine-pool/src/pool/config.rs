//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for an engine pool.
///
/// Fixed at construction; the pool never mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Maximum number of idle engines kept for reuse
    pub max_idle: usize,
    /// Maximum number of checked-out engines (0 = unbounded)
    pub max_active: usize,
    /// Wait for a free engine instead of failing when `max_active` is reached
    pub wait: bool,
    /// Upper bound on a single wait for a free engine (`None` = wait until
    /// an engine is returned or the pool is closed)
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_max_connections(8)
    }
}

impl PoolConfig {
    /// Config with `max` idle and active engines that waits on exhaustion.
    pub fn with_max_connections(max: usize) -> Self {
        Self {
            max_idle: max,
            max_active: max,
            wait: true,
            acquire_timeout: None,
        }
    }

    /// Set the idle capacity.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the active capacity.
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    /// Choose between waiting and failing fast on exhaustion.
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Bound a single wait for a free engine.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Whether `get` goes through the admission semaphore.
    pub(crate) fn uses_semaphore(&self) -> bool {
        self.wait && self.max_active > 0
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_idle == 0 {
            return Err(Error::configuration("max_idle must be greater than 0"));
        }
        if self.max_active > 0 && self.max_idle > self.max_active {
            return Err(Error::configuration(format!(
                "max_idle ({}) must not exceed max_active ({})",
                self.max_idle, self.max_active
            )));
        }
        if self.uses_semaphore() && self.max_active > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(Error::configuration(format!(
                "max_active ({}) exceeds the semaphore limit ({})",
                self.max_active,
                tokio::sync::Semaphore::MAX_PERMITS
            )));
        }
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "acquire_timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON pool configuration.
    ///
    /// Missing fields take their [`Default`] values.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid pool config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
