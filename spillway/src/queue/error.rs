//! Queue error types.

use thiserror::Error;

/// Errors returned by queue writers.
///
/// `Closed` and `ReaderGone` indicate misuse of the close protocol and are
/// treated as structural faults by the pipeline. `Full` is only returned by
/// the non-suspending [`try_enqueue`](super::QueueWriter::try_enqueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The writer already closed the queue.
    #[error("queue is closed for writing")]
    Closed,

    /// The reading side was dropped before the writer closed the queue.
    #[error("queue reader has been dropped")]
    ReaderGone,

    /// The queue is at capacity.
    #[error("queue is full (capacity: {capacity})")]
    Full { capacity: usize },
}

impl QueueError {
    /// Returns true for errors that break the close-cascade contract.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Closed | Self::ReaderGone)
    }
}
