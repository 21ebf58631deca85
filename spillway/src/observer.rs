//! Observation sink for per-item pipeline events.
//!
//! Stages report what happens to each item through the [`PipelineObserver`]
//! trait without knowing who is listening. Every event has a `Display`
//! message, so a sink only needs to accept text.
//!
//! - [`TracingObserver`]: logs events through `tracing` (the default).
//! - [`RecordingObserver`]: keeps events in memory for assertions.

use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::fault::Fault;
use crate::item::{Item, Stage};
use crate::queue::QueueError;

/// Something that happened to an item or a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The producer generated and enqueued an item.
    ItemProduced { item: Item },
    /// The producer failed to generate an item; it is skipped.
    ProducerFault { fault: Fault },
    /// The consumer handled an item.
    ItemConsumed { item: Item },
    /// The consumer failed an item.
    ConsumerFault { fault: Fault },
    /// A failed item was handed to the escalator.
    Escalated { item: Item },
    /// A failed item could not be forwarded and was dropped.
    ForwardDropped { item: Item, error: QueueError },
    /// One escalator attempt failed.
    RetryFailed { fault: Fault },
    /// The escalator handled an item.
    Recovered { item: Item, attempts: u32 },
    /// The escalator gave up on an item.
    PermanentFailure {
        item: Item,
        attempts: u32,
        last_fault: Fault,
    },
    /// A stage stopped early because the run was cancelled.
    Cancelled { stage: Stage },
    /// A stage finished and released its downstream queue.
    StageFinished { stage: Stage },
    /// All stages joined. Carries the two headline counters.
    RunFinished { produced: u64, consumed: u64 },
}

impl PipelineEvent {
    /// Returns the item this event concerns, if any.
    pub fn item(&self) -> Option<Item> {
        match self {
            Self::ItemProduced { item }
            | Self::ItemConsumed { item }
            | Self::Escalated { item }
            | Self::ForwardDropped { item, .. }
            | Self::Recovered { item, .. }
            | Self::PermanentFailure { item, .. } => Some(*item),
            Self::ProducerFault { fault }
            | Self::ConsumerFault { fault }
            | Self::RetryFailed { fault } => Some(fault.item),
            Self::Cancelled { .. } | Self::StageFinished { .. } | Self::RunFinished { .. } => None,
        }
    }

    /// Returns true for permanent-failure records.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(self, Self::PermanentFailure { .. })
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemProduced { item } => write!(f, "Produced item {}", item),
            Self::ProducerFault { fault } => write!(f, "Skipped item {}: {}", fault.item, fault.reason),
            Self::ItemConsumed { item } => write!(f, "Consumed item {}", item),
            Self::ConsumerFault { fault } => {
                write!(f, "Consumer failed item {}: {}", fault.item, fault.reason)
            }
            Self::Escalated { item } => write!(f, "Escalated item {}", item),
            Self::ForwardDropped { item, error } => {
                write!(f, "Dropped failed item {}: {}", item, error)
            }
            Self::RetryFailed { fault } => write!(
                f,
                "Retry {} failed for item {}: {}",
                fault.attempt, fault.item, fault.reason
            ),
            Self::Recovered { item, attempts } => {
                write!(f, "Recovered item {} after {} attempt(s)", item, attempts)
            }
            Self::PermanentFailure {
                item,
                attempts,
                last_fault,
            } => write!(
                f,
                "Failed to process item {} after {} attempt(s): {}",
                item, attempts, last_fault.reason
            ),
            Self::Cancelled { stage } => write!(f, "{} cancelled", stage),
            Self::StageFinished { stage } => write!(f, "{} finished", stage),
            Self::RunFinished { produced, consumed } => write!(
                f,
                "Total Produced: {}, Total Consumed: {}",
                produced, consumed
            ),
        }
    }
}

/// Receives pipeline events.
///
/// Called inline from the stages, so implementations must not block.
pub trait PipelineObserver: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &PipelineEvent);
}

/// Observer that logs every event through `tracing`.
///
/// Routine progress is logged at `debug`, transient faults at `warn`,
/// permanent failures at `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::ItemProduced { item } => debug!(item = item.index(), "{}", event),
            PipelineEvent::ItemConsumed { item } => debug!(item = item.index(), "{}", event),
            PipelineEvent::Escalated { item } => debug!(item = item.index(), "{}", event),
            PipelineEvent::ProducerFault { fault }
            | PipelineEvent::ConsumerFault { fault }
            | PipelineEvent::RetryFailed { fault } => warn!(
                stage = %fault.stage,
                item = fault.item.index(),
                attempt = fault.attempt,
                "{}",
                event
            ),
            PipelineEvent::ForwardDropped { item, .. } => warn!(item = item.index(), "{}", event),
            PipelineEvent::Recovered { item, attempts } => {
                info!(item = item.index(), attempts, "{}", event)
            }
            PipelineEvent::PermanentFailure { item, attempts, .. } => {
                error!(item = item.index(), attempts, "{}", event)
            }
            PipelineEvent::Cancelled { stage } => info!(stage = %stage, "{}", event),
            PipelineEvent::StageFinished { stage } => debug!(stage = %stage, "{}", event),
            PipelineEvent::RunFinished { produced, consumed } => {
                info!(produced, consumed, "{}", event)
            }
        }
    }
}

/// Observer that stores events in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, in arrival order.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Returns the rendered message of every recorded event.
    pub fn messages(&self) -> Vec<String> {
        self.events.lock().iter().map(ToString::to_string).collect()
    }

    /// Counts events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Returns the items that were reported as permanently failed.
    pub fn permanent_failures(&self) -> Vec<Item> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::PermanentFailure { item, .. } => Some(*item),
                _ => None,
            })
            .collect()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events.lock().push(event.clone());
    }
}
