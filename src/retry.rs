//! Per-command retry configuration.

use fugit::Duration;

use crate::{
    error::ConfigError,
    types::{Instant, Timeout},
};

/// Number of attempts used when retries are enabled without an explicit count.
pub const DEFAULT_RETRY_COUNT: u8 = 3;

/// Time to wait for an acknowledgement before resending.
pub const DEFAULT_RETRY_TIMEOUT: Timeout = Timeout::millis(300);

/// How an outbound command is resent until the MCU acknowledges it.
///
/// `count` is the total number of transmissions, including the first one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    enabled: bool,
    count: u8,
    timeout: Timeout,
}

/// Retries are disabled by default, commands are sent once.
impl Default for RetryConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RetryConfig {
    /// Send once, without acknowledgement tracking.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            count: DEFAULT_RETRY_COUNT,
            timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }

    /// Enabled retries with the given attempt count and timeout.
    pub fn new(count: u8, timeout: Timeout) -> Result<Self, ConfigError> {
        if count == 0 {
            return Err(ConfigError::InvalidRetryCount);
        }
        if timeout.ticks() == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(Self {
            enabled: true,
            count,
            timeout,
        })
    }

    /// Enabled retries with the default count of 3 and timeout of 300ms.
    pub const fn enabled_default() -> Self {
        Self {
            enabled: true,
            count: DEFAULT_RETRY_COUNT,
            timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }

    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    pub const fn count(&self) -> u8 {
        self.count
    }

    pub const fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Upper bound on the lifetime of a pending command using this configuration.
    pub const fn max_lifetime(&self) -> Timeout {
        Timeout::from_ticks(self.timeout.ticks().saturating_mul(self.count as u32))
    }

    /// Deadline for an attempt made at `now`.
    pub(crate) fn deadline_from(&self, now: Instant) -> Instant {
        now + Duration::<u64, 1, 1_000>::from_ticks(u64::from(self.timeout.ticks()))
    }
}
