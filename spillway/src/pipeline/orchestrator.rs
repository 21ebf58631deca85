//! Pipeline orchestrator.
//!
//! Builds the two queues, spawns the three stages as Tokio tasks and joins
//! them. Termination is driven by the close cascade: the producer runs out of
//! items, the consumer sees end-of-stream and closes the error queue, the
//! escalator sees end-of-stream and returns.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use spillway::pipeline::{Pipeline, PipelineConfig};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let config = PipelineConfig::new(20).with_production_delay(Duration::ZERO);
//! let report = Pipeline::new(config).unwrap().run().await.unwrap();
//! assert_eq!(report.metrics.produced, 20);
//! assert_eq!(report.metrics.consumed, 20);
//! # });
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::stages::{Consumer, Escalator, Producer, StageContext};
use super::{PipelineConfig, PipelineError};
use crate::fault::{FaultInjector, NeverFail};
use crate::item::{Item, Stage};
use crate::observer::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::queue::{BoundedQueue, QueueStats};
use crate::telemetry::{MetricsSnapshot, PipelineMetrics};

// =============================================================================
// Report
// =============================================================================

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Counters at the moment all stages finished.
    pub metrics: MetricsSnapshot,
    /// Items the escalator gave up on, in the order it gave up.
    pub permanently_failed: Vec<Item>,
    /// Primary queue counters.
    pub primary_queue: QueueStats,
    /// Error queue counters.
    pub error_queue: QueueStats,
    /// True if a stage stopped early because the cancellation token fired.
    /// A token that fires after every stage finished leaves this false.
    pub cancelled: bool,
}

impl PipelineReport {
    /// Returns true if every produced item was consumed.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.metrics.consumed == self.metrics.produced
    }

    /// Returns true if both queues were closed once and read to the end.
    pub fn queues_drained(&self) -> bool {
        [&self.primary_queue, &self.error_queue]
            .iter()
            .all(|q| q.close_count() == 1 && q.is_drained())
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metrics)?;
        if !self.permanently_failed.is_empty() {
            let items: Vec<String> = self.permanently_failed.iter().map(Item::to_string).collect();
            write!(f, "\n  permanently failed items: {}", items.join(", "))?;
        }
        if self.cancelled {
            write!(f, "\n  run was cancelled")?;
        }
        Ok(())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// A configured producer, consumer, escalator pipeline.
///
/// A `Pipeline` can be run any number of times. Each run gets fresh queues
/// and fresh counters; the fault injector and observer are shared.
pub struct Pipeline {
    config: PipelineConfig,
    faults: Arc<dyn FaultInjector>,
    observer: Arc<dyn PipelineObserver>,
}

impl Pipeline {
    /// Creates a pipeline that never injects faults and logs through
    /// `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            faults: Arc::new(NeverFail),
            observer: Arc::new(TracingObserver),
        })
    }

    /// Set the fault injector.
    pub fn with_faults(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline until every item reaches a terminal state.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// Runs the pipeline, stopping early if `cancel` fires.
    ///
    /// Cancellation still closes both queues, so every stage returns. The
    /// report has `cancelled` set only if some stage actually stopped early.
    ///
    /// # Errors
    ///
    /// Fails only on a structural fault: a queue contract violation or a
    /// stage panic. When several stages fail, the root cause is reported
    /// rather than the knock-on `ReaderGone` errors it caused upstream.
    #[instrument(name = "pipeline", skip_all, fields(items = self.config.item_count))]
    pub async fn run_with_cancellation(
        &self,
        cancel: CancellationToken,
    ) -> Result<PipelineReport, PipelineError> {
        let config = &self.config;
        let metrics = Arc::new(PipelineMetrics::new());
        let ctx = StageContext::new(
            Arc::clone(&self.faults),
            Arc::clone(&self.observer),
            Arc::clone(&metrics),
        )
        .with_cancellation(cancel);

        let primary = BoundedQueue::new(config.primary_capacity);
        let errors = BoundedQueue::new(config.error_capacity);
        let primary_queue = primary.stats();
        let error_queue = errors.stats();
        let (primary_tx, primary_rx) = primary.split();
        let (errors_tx, errors_rx) = errors.split();

        info!(
            primary_capacity = %config.primary_capacity,
            error_capacity = %config.error_capacity,
            retry = %config.retry,
            forward = %config.forward_policy,
            "starting pipeline"
        );

        let producer = tokio::spawn(
            Producer::new(
                config.item_count,
                config.production_delay,
                primary_tx,
                ctx.clone(),
            )
            .run(),
        );
        let consumer = tokio::spawn(
            Consumer::new(primary_rx, errors_tx, config.forward_policy, ctx.clone()).run(),
        );
        let escalator =
            tokio::spawn(Escalator::new(errors_rx, config.retry.clone(), ctx.clone()).run());

        let (producer, consumer, escalator) = tokio::join!(producer, consumer, escalator);

        let producer = flatten(Stage::Producer, producer);
        let consumer = flatten(Stage::Consumer, consumer);
        let escalator = flatten(Stage::Escalator, escalator);

        let mut failures = Vec::new();
        if let Err(e) = producer {
            failures.push(e);
        }
        if let Err(e) = consumer {
            failures.push(e);
        }
        let permanently_failed = match escalator {
            Ok(items) => items,
            Err(e) => {
                failures.push(e);
                Vec::new()
            }
        };

        if let Some(error) = root_cause(failures) {
            warn!(error = %error, "pipeline aborted");
            return Err(error);
        }

        let metrics = metrics.snapshot();
        self.observer.on_event(&PipelineEvent::RunFinished {
            produced: metrics.produced,
            consumed: metrics.consumed,
        });

        Ok(PipelineReport {
            metrics,
            permanently_failed,
            primary_queue,
            error_queue,
            cancelled: ctx.was_cut_short(),
        })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn flatten<T>(
    stage: Stage,
    joined: Result<Result<T, PipelineError>, JoinError>,
) -> Result<T, PipelineError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(PipelineError::StagePanicked {
            stage,
            message: panic_message(e.into_panic()),
        }),
        Err(_) => Err(PipelineError::StagePanicked {
            stage,
            message: "task was cancelled".to_string(),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Picks the error to report: the first primary failure, else the first.
fn root_cause(mut failures: Vec<PipelineError>) -> Option<PipelineError> {
    match failures.iter().position(|e| !e.is_secondary()) {
        Some(index) => Some(failures.swap_remove(index)),
        None => failures.into_iter().next(),
    }
}
