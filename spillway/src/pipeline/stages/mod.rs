//! The three pipeline stages.
//!
//! Each stage owns the reader of its input queue and the writer of its
//! output queue. Returning from `run`, for any reason, drops the writer and
//! closes the downstream queue.
//!
//! ```text
//! Producer ──► primary queue ──► Consumer ──► error queue ──► Escalator
//! ```

mod consumer;
mod escalator;
mod producer;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::fault::FaultInjector;
use crate::item::Stage;
use crate::observer::{PipelineEvent, PipelineObserver};
use crate::telemetry::PipelineMetrics;

pub use consumer::Consumer;
pub use escalator::Escalator;
pub use producer::Producer;

/// Collaborators shared by every stage of one run.
#[derive(Clone)]
pub struct StageContext {
    /// Decides which items fail.
    pub faults: Arc<dyn FaultInjector>,
    /// Receives per-item events.
    pub observer: Arc<dyn PipelineObserver>,
    /// Shared counters.
    pub metrics: Arc<PipelineMetrics>,
    /// Stops the stage at its next suspension point.
    pub cancel: CancellationToken,
    /// Set once any stage returns because of `cancel`.
    cut_short: Arc<AtomicBool>,
}

impl StageContext {
    /// Creates a context with a fresh cancellation token.
    pub fn new(
        faults: Arc<dyn FaultInjector>,
        observer: Arc<dyn PipelineObserver>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            faults,
            observer,
            metrics,
            cancel: CancellationToken::new(),
            cut_short: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns true if a stage sharing this context stopped before its
    /// input was exhausted.
    ///
    /// A token that fires after every stage finished normally leaves this
    /// false.
    pub fn was_cut_short(&self) -> bool {
        self.cut_short.load(Ordering::Acquire)
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }

    fn stopped_early(&self, stage: Stage) {
        self.cut_short.store(true, Ordering::Release);
        self.emit(PipelineEvent::Cancelled { stage });
    }

    /// Runs `fut` unless the token fires first. Returns `None` if cancelled.
    async fn until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

impl std::fmt::Debug for StageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("cut_short", &self.was_cut_short())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::fault::NeverFail;
    use crate::observer::RecordingObserver;

    /// Context with a recording observer, returned alongside it.
    pub fn context(faults: Arc<dyn FaultInjector>) -> (StageContext, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::new());
        let ctx = StageContext::new(faults, observer.clone(), Arc::new(PipelineMetrics::new()));
        (ctx, observer)
    }

    pub fn never_fail() -> Arc<dyn FaultInjector> {
        Arc::new(NeverFail)
    }
}
