//! Construction-time pipeline parameters.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::ConfigError;
use crate::queue::QueueCapacity;
use crate::retry::RetryPolicy;

/// Default number of items the producer generates.
pub const DEFAULT_ITEM_COUNT: u64 = 100;

/// Default capacity of both queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default simulated production latency per item (10ms).
pub const DEFAULT_PRODUCTION_DELAY_MS: u64 = 10;

/// How the consumer hands a failed item to the error queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ForwardPolicy {
    /// Suspend until the error queue has room. A slow escalator slows the
    /// consumer down.
    #[default]
    Block,

    /// Send only if the error queue has room right now; otherwise report the
    /// item as dropped and move on.
    BestEffort,
}

impl ForwardPolicy {
    /// Name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::BestEffort => "best_effort",
        }
    }
}

impl fmt::Display for ForwardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForwardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "best_effort" | "best-effort" | "besteffort" => Ok(Self::BestEffort),
            other => Err(format!("unknown forward policy '{}'", other)),
        }
    }
}

/// Parameters for one pipeline run.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Number of items the producer generates (indices `0..item_count`).
    pub item_count: u64,

    /// Capacity of the queue between producer and consumer.
    pub primary_capacity: QueueCapacity,

    /// Capacity of the queue between consumer and escalator.
    pub error_capacity: QueueCapacity,

    /// Escalator retry policy.
    pub retry: RetryPolicy,

    /// Delay after generating each item.
    pub production_delay: Duration,

    /// How failed items reach the error queue.
    pub forward_policy: ForwardPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            item_count: DEFAULT_ITEM_COUNT,
            primary_capacity: QueueCapacity::Bounded(DEFAULT_QUEUE_CAPACITY),
            error_capacity: QueueCapacity::Bounded(DEFAULT_QUEUE_CAPACITY),
            retry: RetryPolicy::default(),
            production_delay: Duration::from_millis(DEFAULT_PRODUCTION_DELAY_MS),
            forward_policy: ForwardPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a config for `item_count` items with default settings.
    pub fn new(item_count: u64) -> Self {
        Self {
            item_count,
            ..Default::default()
        }
    }

    /// Set the number of items.
    pub fn with_item_count(mut self, item_count: u64) -> Self {
        self.item_count = item_count;
        self
    }

    /// Set the capacity of both queues.
    pub fn with_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.primary_capacity = capacity;
        self.error_capacity = capacity;
        self
    }

    /// Set the primary queue capacity.
    pub fn with_primary_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.primary_capacity = capacity;
        self
    }

    /// Set the error queue capacity.
    pub fn with_error_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.error_capacity = capacity;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the attempt limit, keeping the retry delay schedule.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(max_attempts);
        self
    }

    /// Set the production delay.
    pub fn with_production_delay(mut self, delay: Duration) -> Self {
        self.production_delay = delay;
        self
    }

    /// Set the forward policy.
    pub fn with_forward_policy(mut self, policy: ForwardPolicy) -> Self {
        self.forward_policy = policy;
        self
    }

    /// Checks the parameters can build a pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_capacity == QueueCapacity::Bounded(0) {
            return Err(ConfigError::Invalid(
                "primary queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.error_capacity == QueueCapacity::Bounded(0) {
            return Err(ConfigError::Invalid(
                "error queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts() == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
