//! Bounded retry for items that failed in the consumer.
//!
//! - [`RetryPolicy`]: attempt limit and delay schedule.
//! - [`RetryState`]: per-item attempt counter producing a [`RetryOutcome`].

mod policy;
mod state;

pub use policy::{
    RetryPolicy, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_SECS,
};
pub use state::{RetryOutcome, RetryState};
