//! Retry policy for escalated items.
//!
//! The policy bounds how many times the escalator tries an item and how long
//! it waits between attempts.
//!
//! # Example
//!
//! ```
//! use spillway::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! // Three back-to-back attempts (the default)
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.delay_for_attempt(1), Some(Duration::ZERO));
//!
//! // Exponential backoff between attempts
//! let policy = RetryPolicy::exponential(4);
//! assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
//! ```

use std::fmt;
use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default number of escalator attempts per item.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// How the escalator retries an item that failed in the consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// Fixed number of attempts with a constant delay between them.
    Fixed {
        /// Maximum number of attempts.
        max_attempts: u32,
        /// Delay before each attempt after the first.
        delay: Duration,
    },

    /// Exponential backoff between attempts.
    ///
    /// The delay grows by `multiplier` after each failed attempt, capped at
    /// `max_delay`.
    ExponentialBackoff {
        /// Maximum number of attempts.
        max_attempts: u32,
        /// Delay before the second attempt.
        initial_delay: Duration,
        /// Maximum delay cap.
        max_delay: Duration,
        /// Multiplier applied after each failure (typically 2.0).
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::immediate(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Creates a policy with no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::Fixed {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    /// Creates a fixed-delay policy.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed { max_attempts, delay }
    }

    /// Creates an exponential backoff policy with the default timings.
    ///
    /// Uses:
    /// - Initial delay: 100ms ([`DEFAULT_INITIAL_DELAY_MS`])
    /// - Max delay: 30 seconds ([`DEFAULT_MAX_DELAY_SECS`])
    /// - Multiplier: 2.0 ([`DEFAULT_BACKOFF_MULTIPLIER`])
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Returns the delay before attempt index `attempt`.
    ///
    /// Attempt 0 is the first try and never waits. Returns `None` once
    /// `attempt` reaches `max_attempts`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts() {
            return None;
        }
        if attempt == 0 {
            return Some(Duration::ZERO);
        }

        match self {
            Self::Fixed { delay, .. } => Some(*delay),
            Self::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                // initial_delay * multiplier^(attempt-1)
                let factor = multiplier.powi((attempt - 1) as i32);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let delay =
                    Duration::from_millis(delay_ms.min(max_delay.as_millis() as f64) as u64);
                Some(delay.min(*max_delay))
            }
        }
    }

    /// Returns the maximum number of attempts.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::Fixed { max_attempts, .. } => *max_attempts,
            Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }

    /// Returns a copy of this policy with a different attempt limit.
    pub fn with_max_attempts(self, max: u32) -> Self {
        match self {
            Self::Fixed { delay, .. } => Self::Fixed {
                max_attempts: max,
                delay,
            },
            Self::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => Self::ExponentialBackoff {
                max_attempts: max,
                initial_delay,
                max_delay,
                multiplier,
            },
        }
    }

    /// Short name used in configuration files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::ExponentialBackoff { .. } => "exponential",
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed {
                max_attempts,
                delay,
            } => write!(f, "fixed({} attempts, {:?} apart)", max_attempts, delay),
            Self::ExponentialBackoff {
                max_attempts,
                initial_delay,
                max_delay,
                ..
            } => write!(
                f,
                "exponential({} attempts, {:?}..{:?})",
                max_attempts, initial_delay, max_delay
            ),
        }
    }
}
