//! Consumer stage - handles items and diverts failures to the error queue.

use tracing::{debug, instrument};

use super::StageContext;
use crate::item::{Item, Stage};
use crate::observer::PipelineEvent;
use crate::pipeline::{ForwardPolicy, PipelineError};
use crate::queue::{QueueError, QueueReader, QueueWriter};

/// Drains the primary queue and forwards failed items to the escalator.
///
/// A consumer fault never stops the loop. The error queue is closed once the
/// primary queue reports end-of-stream, and also on any early exit since the
/// stage owns its writer.
pub struct Consumer {
    input: QueueReader<Item>,
    errors: QueueWriter<Item>,
    forward_policy: ForwardPolicy,
    ctx: StageContext,
}

impl Consumer {
    /// Creates a consumer reading `input` and forwarding failures to `errors`.
    pub fn new(
        input: QueueReader<Item>,
        errors: QueueWriter<Item>,
        forward_policy: ForwardPolicy,
        ctx: StageContext,
    ) -> Self {
        Self {
            input,
            errors,
            forward_policy,
            ctx,
        }
    }

    /// Runs the consumer until the primary queue is drained.
    ///
    /// Fails only if the error queue breaks its contract (escalator gone).
    #[instrument(name = "consumer", skip_all, fields(forward = %self.forward_policy))]
    pub async fn run(self) -> Result<(), PipelineError> {
        let Self {
            mut input,
            mut errors,
            forward_policy,
            ctx,
        } = self;

        loop {
            let item = match ctx.until_cancelled(input.dequeue()).await {
                Some(Some(item)) => item,
                Some(None) => break,
                None => {
                    ctx.stopped_early(Stage::Consumer);
                    return Ok(());
                }
            };

            let fault = match ctx.faults.check(Stage::Consumer, item, 0) {
                Ok(()) => {
                    ctx.metrics.item_consumed();
                    ctx.emit(PipelineEvent::ItemConsumed { item });
                    continue;
                }
                Err(fault) => fault,
            };

            ctx.metrics.consumer_fault();
            ctx.emit(PipelineEvent::ConsumerFault { fault });

            let forwarded = match forward_policy {
                ForwardPolicy::Block => match ctx.until_cancelled(errors.enqueue(item)).await {
                    Some(result) => result,
                    None => {
                        ctx.stopped_early(Stage::Consumer);
                        return Ok(());
                    }
                },
                ForwardPolicy::BestEffort => errors.try_enqueue(item),
            };

            match forwarded {
                Ok(()) => {
                    ctx.metrics.item_escalated();
                    ctx.emit(PipelineEvent::Escalated { item });
                }
                Err(error @ QueueError::Full { .. }) => {
                    ctx.metrics.forward_dropped();
                    ctx.emit(PipelineEvent::ForwardDropped { item, error });
                }
                Err(error) => return Err(PipelineError::queue(Stage::Consumer, error)),
            }
        }

        errors.close();
        debug!(consumed = ctx.metrics.consumed(), "error queue closed");
        ctx.emit(PipelineEvent::StageFinished {
            stage: Stage::Consumer,
        });
        Ok(())
    }
}
