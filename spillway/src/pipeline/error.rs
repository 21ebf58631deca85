//! Pipeline error types.

use thiserror::Error;

use crate::config::ConfigError;
use crate::item::Stage;
use crate::queue::QueueError;

/// Errors that fail a pipeline run.
///
/// Per-item faults never show up here. Only broken queue contracts, stage
/// panics and invalid configuration do.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage misused one of its queues.
    #[error("{stage} stage aborted: {source}")]
    Queue {
        stage: Stage,
        #[source]
        source: QueueError,
    },

    /// A stage task panicked.
    #[error("{stage} stage panicked: {message}")]
    StagePanicked { stage: Stage, message: String },

    /// The pipeline configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Wraps a queue error raised by `stage`.
    pub fn queue(stage: Stage, source: QueueError) -> Self {
        Self::Queue { stage, source }
    }

    /// Returns the stage that failed, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Queue { stage, .. } | Self::StagePanicked { stage, .. } => Some(*stage),
            Self::Config(_) => None,
        }
    }

    /// Returns true if this error is a consequence of another stage failing
    /// first (its queue partner disappeared).
    pub fn is_secondary(&self) -> bool {
        matches!(
            self,
            Self::Queue {
                source: QueueError::ReaderGone,
                ..
            }
        )
    }
}
