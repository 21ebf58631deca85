//! Producer stage - generates items into the primary queue.

use std::time::Duration;

use tracing::{debug, instrument};

use super::StageContext;
use crate::item::{Item, Stage};
use crate::observer::PipelineEvent;
use crate::pipeline::PipelineError;
use crate::queue::QueueWriter;

/// Generates items `0..item_count` into the primary queue.
///
/// Per item: ask the fault injector, wait the production delay, enqueue,
/// count. A fault skips the item and the loop moves on. The primary queue is
/// closed when the loop ends, and also if the stage is cancelled or aborted,
/// because the writer is owned by the stage.
pub struct Producer {
    item_count: u64,
    delay: Duration,
    output: QueueWriter<Item>,
    ctx: StageContext,
}

impl Producer {
    /// Creates a producer writing into `output`.
    pub fn new(item_count: u64, delay: Duration, output: QueueWriter<Item>, ctx: StageContext) -> Self {
        Self {
            item_count,
            delay,
            output,
            ctx,
        }
    }

    /// Runs the producer to completion.
    ///
    /// Fails only if the primary queue rejects an item (closed or reader
    /// gone).
    #[instrument(name = "producer", skip_all, fields(items = self.item_count))]
    pub async fn run(self) -> Result<(), PipelineError> {
        let Self {
            item_count,
            delay,
            mut output,
            ctx,
        } = self;

        for index in 0..item_count {
            let item = Item::new(index);

            if let Err(fault) = ctx.faults.check(Stage::Producer, item, 0) {
                ctx.metrics.producer_fault();
                ctx.emit(PipelineEvent::ProducerFault { fault });
                continue;
            }

            if !delay.is_zero() && ctx.until_cancelled(tokio::time::sleep(delay)).await.is_none() {
                ctx.stopped_early(Stage::Producer);
                return Ok(());
            }

            match ctx.until_cancelled(output.enqueue(item)).await {
                Some(result) => result.map_err(|e| PipelineError::queue(Stage::Producer, e))?,
                None => {
                    ctx.stopped_early(Stage::Producer);
                    return Ok(());
                }
            }

            ctx.metrics.item_produced();
            ctx.emit(PipelineEvent::ItemProduced { item });
        }

        output.close();
        debug!(produced = ctx.metrics.produced(), "primary queue closed");
        ctx.emit(PipelineEvent::StageFinished {
            stage: Stage::Producer,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, never_fail};
    use super::*;
    use crate::fault::ScriptedFaults;
    use crate::queue::{BoundedQueue, QueueCapacity, QueueError};
    use std::sync::Arc;
    use tokio::time::timeout;

    async fn drain(reader: &mut crate::queue::QueueReader<Item>) -> Vec<u64> {
        let mut items = Vec::new();
        while let Some(item) = reader.dequeue().await {
            items.push(item.index());
        }
        items
    }

    #[tokio::test]
    async fn test_produces_all_items_and_closes() {
        let (writer, mut reader) = BoundedQueue::new(QueueCapacity::Unbounded).split();
        let (ctx, observer) = context(never_fail());
        let metrics = ctx.metrics.clone();

        Producer::new(5, Duration::ZERO, writer, ctx).run().await.unwrap();

        assert_eq!(drain(&mut reader).await, vec![0, 1, 2, 3, 4]);
        assert_eq!(metrics.produced(), 5);
        assert_eq!(reader.stats().close_count(), 1);
        assert!(observer
            .events()
            .contains(&PipelineEvent::StageFinished { stage: Stage::Producer }));
    }

    #[tokio::test]
    async fn test_fault_skips_item_and_continues() {
        let faults = Arc::new(ScriptedFaults::new().fail_times(Stage::Producer, 2, 1));
        let (writer, mut reader) = BoundedQueue::new(QueueCapacity::Unbounded).split();
        let (ctx, observer) = context(faults);
        let metrics = ctx.metrics.clone();

        Producer::new(4, Duration::ZERO, writer, ctx).run().await.unwrap();

        assert_eq!(drain(&mut reader).await, vec![0, 1, 3]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.produced, 3);
        assert_eq!(snapshot.producer_faults, 1);
        assert_eq!(
            observer.count(|e| matches!(e, PipelineEvent::ProducerFault { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_zero_items_still_closes() {
        let (writer, mut reader) = BoundedQueue::<Item>::new(QueueCapacity::Bounded(1)).split();
        let (ctx, _observer) = context(never_fail());

        Producer::new(0, Duration::ZERO, writer, ctx).run().await.unwrap();

        assert_eq!(reader.dequeue().await, None);
        assert_eq!(reader.stats().close_count(), 1);
    }

    #[tokio::test]
    async fn test_backpressure_suspends_producer() {
        let (writer, mut reader) = BoundedQueue::new(QueueCapacity::Bounded(2)).split();
        let (ctx, _observer) = context(never_fail());
        let metrics = ctx.metrics.clone();

        let handle = tokio::spawn(Producer::new(5, Duration::ZERO, writer, ctx).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished(), "producer should wait for space");
        assert_eq!(metrics.produced(), 2);
        assert_eq!(reader.len(), 2);

        assert_eq!(drain(&mut reader).await, vec![0, 1, 2, 3, 4]);
        handle.await.unwrap().unwrap();
        assert_eq!(reader.stats().peak_len(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_closes_queue() {
        let (writer, mut reader) = BoundedQueue::new(QueueCapacity::Bounded(1)).split();
        let (ctx, observer) = context(never_fail());
        let cancel = ctx.cancel.clone();
        let shared = ctx.clone();

        let handle = tokio::spawn(Producer::new(100, Duration::ZERO, writer, ctx).run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("producer should stop")
            .unwrap()
            .unwrap();

        // Only the accepted item counts; the enqueue cut short by the token
        // does not.
        assert_eq!(shared.metrics.produced(), 1);
        assert!(shared.was_cut_short());
        assert_eq!(drain(&mut reader).await, vec![0]);
        assert_eq!(reader.stats().close_count(), 1);
        assert_eq!(
            observer.count(|e| matches!(e, PipelineEvent::Cancelled { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_reader_gone_aborts_stage() {
        let (writer, reader) = BoundedQueue::new(QueueCapacity::Bounded(1)).split();
        drop(reader);
        let (ctx, _observer) = context(never_fail());

        let err = Producer::new(3, Duration::ZERO, writer, ctx).run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Queue {
                stage: Stage::Producer,
                source: QueueError::ReaderGone,
            }
        ));
    }
}
