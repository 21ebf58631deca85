//! Escalator stage - retries failed items and records permanent failures.

use tracing::{debug, instrument};

use super::StageContext;
use crate::item::{Item, Stage};
use crate::observer::PipelineEvent;
use crate::pipeline::PipelineError;
use crate::queue::QueueReader;
use crate::retry::{RetryOutcome, RetryPolicy, RetryState};

/// Retries each item from the error queue under a [`RetryPolicy`].
///
/// Items are handled one at a time in arrival order. An item that exhausts
/// its attempts is reported and collected, then the stage moves on.
pub struct Escalator {
    input: QueueReader<Item>,
    retry: RetryPolicy,
    ctx: StageContext,
}

impl Escalator {
    /// Creates an escalator reading failed items from `input`.
    ///
    /// # Panics
    ///
    /// Panics if `retry` allows 0 attempts. [`PipelineConfig::validate`]
    /// rejects such a policy before a run starts.
    ///
    /// [`PipelineConfig::validate`]: crate::pipeline::PipelineConfig::validate
    pub fn new(input: QueueReader<Item>, retry: RetryPolicy, ctx: StageContext) -> Self {
        assert!(
            retry.max_attempts() > 0,
            "escalator needs at least 1 attempt per item"
        );
        Self { input, retry, ctx }
    }

    /// Runs until the error queue is drained.
    ///
    /// Returns the items that failed permanently, in the order they were
    /// given up on.
    #[instrument(name = "escalator", skip_all, fields(max_attempts = self.retry.max_attempts()))]
    pub async fn run(self) -> Result<Vec<Item>, PipelineError> {
        let Self {
            mut input,
            retry,
            ctx,
        } = self;
        let mut failed = Vec::new();

        loop {
            let item = match ctx.until_cancelled(input.dequeue()).await {
                Some(Some(item)) => item,
                Some(None) => break,
                None => {
                    ctx.stopped_early(Stage::Escalator);
                    return Ok(failed);
                }
            };

            match retry_item(&ctx, &retry, item).await {
                Some(RetryOutcome::Succeeded { attempts }) => {
                    ctx.metrics.item_recovered();
                    ctx.emit(PipelineEvent::Recovered { item, attempts });
                }
                Some(RetryOutcome::PermanentlyFailed {
                    attempts,
                    last_fault,
                }) => {
                    ctx.metrics.item_permanently_failed();
                    ctx.emit(PipelineEvent::PermanentFailure {
                        item,
                        attempts,
                        last_fault,
                    });
                    failed.push(item);
                }
                None => {
                    ctx.stopped_early(Stage::Escalator);
                    return Ok(failed);
                }
            }
        }

        debug!(permanently_failed = failed.len(), "error queue drained");
        ctx.emit(PipelineEvent::StageFinished {
            stage: Stage::Escalator,
        });
        Ok(failed)
    }
}

/// Attempts `item` until success or exhaustion. `None` means cancelled
/// while waiting between attempts.
async fn retry_item(ctx: &StageContext, retry: &RetryPolicy, item: Item) -> Option<RetryOutcome> {
    let mut state = RetryState::new(retry.max_attempts());

    loop {
        let attempt = state.next_attempt()?;

        match retry.delay_for_attempt(attempt) {
            Some(delay) if !delay.is_zero() => {
                ctx.until_cancelled(tokio::time::sleep(delay)).await?;
            }
            _ => {}
        }

        ctx.metrics.retry_attempted();
        match ctx.faults.check(Stage::Escalator, item, attempt + 1) {
            Ok(()) => return Some(state.record_success()),
            Err(fault) => {
                ctx.emit(PipelineEvent::RetryFailed {
                    fault: fault.clone(),
                });
                if let Some(outcome) = state.record_failure(fault) {
                    return Some(outcome);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, never_fail};
    use super::*;
    use crate::fault::{fault_fn, Fault, ScriptedFaults};
    use crate::queue::{BoundedQueue, QueueCapacity};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn feed(items: &[u64]) -> QueueReader<Item> {
        let (mut writer, reader) = BoundedQueue::new(QueueCapacity::Unbounded).split();
        for &index in items {
            writer.enqueue(Item::new(index)).await.unwrap();
        }
        writer.close();
        reader
    }

    #[tokio::test]
    async fn test_recovers_on_first_attempt() {
        let (ctx, observer) = context(never_fail());
        let metrics = ctx.metrics.clone();

        let failed = Escalator::new(feed(&[4, 7]).await, RetryPolicy::immediate(3), ctx)
            .run()
            .await
            .unwrap();

        assert!(failed.is_empty());
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.recovered, 2);
        assert_eq!(snapshot.consumed, 2);
        assert_eq!(snapshot.retry_attempts, 2);
        assert!(observer.events().contains(&PipelineEvent::Recovered {
            item: Item::new(4),
            attempts: 1,
        }));
    }

    #[tokio::test]
    async fn test_recovers_after_retries() {
        let faults = Arc::new(ScriptedFaults::new().fail_times(Stage::Escalator, 1, 2));
        let (ctx, observer) = context(faults);
        let metrics = ctx.metrics.clone();

        let failed = Escalator::new(feed(&[1]).await, RetryPolicy::immediate(3), ctx)
            .run()
            .await
            .unwrap();

        assert!(failed.is_empty());
        assert_eq!(metrics.snapshot().retry_attempts, 3);
        assert_eq!(
            observer.count(|e| matches!(e, PipelineEvent::RetryFailed { .. })),
            2
        );
        assert!(observer.events().contains(&PipelineEvent::Recovered {
            item: Item::new(1),
            attempts: 3,
        }));
    }

    #[tokio::test]
    async fn test_permanent_failure_after_max_attempts() {
        let faults = Arc::new(ScriptedFaults::new().fail_always(Stage::Escalator, 2));
        let (ctx, observer) = context(faults);
        let metrics = ctx.metrics.clone();

        let failed = Escalator::new(feed(&[2, 5]).await, RetryPolicy::immediate(3), ctx)
            .run()
            .await
            .unwrap();

        assert_eq!(failed, vec![Item::new(2)]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.permanently_failed, 1);
        assert_eq!(snapshot.recovered, 1);
        assert_eq!(snapshot.retry_attempts, 4);
        assert_eq!(observer.permanent_failures(), vec![Item::new(2)]);

        let message = observer
            .events()
            .into_iter()
            .find(|e| e.is_permanent_failure())
            .map(|e| e.to_string())
            .unwrap();
        assert!(message.starts_with("Failed to process item #2 after 3 attempt(s)"));
    }

    #[tokio::test]
    async fn test_items_settled_in_arrival_order() {
        let faults = Arc::new(
            ScriptedFaults::new()
                .fail_always(Stage::Escalator, 8)
                .fail_times(Stage::Escalator, 3, 2)
                .fail_always(Stage::Escalator, 1)
                .fail_times(Stage::Escalator, 6, 1),
        );
        let (ctx, observer) = context(faults);
        let arrivals = [8, 3, 5, 1, 6, 0];

        let failed = Escalator::new(feed(&arrivals).await, RetryPolicy::immediate(3), ctx)
            .run()
            .await
            .unwrap();

        assert_eq!(failed, vec![Item::new(8), Item::new(1)]);

        let settled: Vec<(u64, bool)> = observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::Recovered { item, .. } => Some((item.index(), true)),
                PipelineEvent::PermanentFailure { item, .. } => Some((item.index(), false)),
                _ => None,
            })
            .collect();
        assert_eq!(
            settled,
            vec![(8, false), (3, true), (5, true), (1, false), (6, true), (0, true)]
        );

        // Every attempt for an item happens before the next item is touched.
        let retried: Vec<u64> = observer
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::RetryFailed { fault } => Some(fault.item.index()),
                _ => None,
            })
            .collect();
        assert_eq!(retried, vec![8, 8, 8, 3, 3, 1, 1, 1, 6]);
    }

    #[tokio::test]
    #[should_panic(expected = "escalator needs at least 1 attempt per item")]
    async fn test_zero_attempts_rejected() {
        let (ctx, _observer) = context(never_fail());
        let _ = Escalator::new(feed(&[0]).await, RetryPolicy::immediate(0), ctx);
    }

    #[tokio::test]
    async fn test_attempt_numbers_start_at_one() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let faults = Arc::new(fault_fn(move |stage: Stage, item: Item, attempt: u32| {
            recorder.lock().push(attempt);
            Err(Fault::new(stage, item, attempt, "nope"))
        }));
        let (ctx, _observer) = context(faults);

        Escalator::new(feed(&[0]).await, RetryPolicy::immediate(2), ctx)
            .run()
            .await
            .unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_fixed_delay_between_attempts() {
        let faults = Arc::new(ScriptedFaults::new().fail_times(Stage::Escalator, 0, 1));
        let (ctx, _observer) = context(faults);
        let policy = RetryPolicy::fixed(2, Duration::from_millis(30));

        let started = std::time::Instant::now();
        let failed = Escalator::new(feed(&[0]).await, policy, ctx)
            .run()
            .await
            .unwrap();

        assert!(failed.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_cancellation_during_retry_delay() {
        let faults = Arc::new(ScriptedFaults::new().fail_always(Stage::Escalator, 0));
        let (ctx, observer) = context(faults);
        let cancel = ctx.cancel.clone();
        let policy = RetryPolicy::fixed(3, Duration::from_secs(60));

        let handle = tokio::spawn(Escalator::new(feed(&[0]).await, policy, ctx).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let failed = timeout(Duration::from_secs(1), handle)
            .await
            .expect("escalator should stop")
            .unwrap()
            .unwrap();
        assert!(failed.is_empty());
        assert_eq!(
            observer.count(|e| matches!(e, PipelineEvent::Cancelled { .. })),
            1
        );
    }
}
