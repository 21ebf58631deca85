//! Work items and the stages that handle them.

use std::fmt;

/// A unit of work flowing through the pipeline.
///
/// Items are identified by their sequence index and are immutable once the
/// producer has created them. Ownership moves stage to stage through the
/// queues; an item is never held by two stages at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    index: u64,
}

impl Item {
    /// Creates an item with the given sequence index.
    pub fn new(index: u64) -> Self {
        Self { index }
    }

    /// Returns the sequence index assigned by the producer.
    pub fn index(&self) -> u64 {
        self.index
    }
}

impl From<u64> for Item {
    fn from(index: u64) -> Self {
        Self::new(index)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// The three stages of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Generates items and feeds the primary queue.
    Producer,
    /// Drains the primary queue and forwards failures to the error queue.
    Consumer,
    /// Drains the error queue and retries failed items.
    Escalator,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::Producer, Stage::Consumer, Stage::Escalator];

    /// Short lowercase name used in logs and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Producer => "producer",
            Stage::Consumer => "consumer",
            Stage::Escalator => "escalator",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
