//! Atomic pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::snapshot::MetricsSnapshot;

/// Counters shared by all pipeline stages.
///
/// `produced` and `consumed` are the two totals reported at the end of a
/// run. The remaining counters break those totals down. All updates are
/// atomic; `consumed` is written by both the consumer and the escalator.
#[derive(Debug)]
pub struct PipelineMetrics {
    produced: AtomicU64,
    consumed: AtomicU64,
    consumed_first_pass: AtomicU64,
    recovered: AtomicU64,
    producer_faults: AtomicU64,
    consumer_faults: AtomicU64,
    escalated: AtomicU64,
    retry_attempts: AtomicU64,
    permanently_failed: AtomicU64,
    forward_dropped: AtomicU64,
    started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self {
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            consumed_first_pass: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
            producer_faults: AtomicU64::new(0),
            consumer_faults: AtomicU64::new(0),
            escalated: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            permanently_failed: AtomicU64::new(0),
            forward_dropped: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// The primary queue accepted an item from the producer.
    pub fn item_produced(&self) {
        self.produced.fetch_add(1, Ordering::Relaxed);
    }

    /// The producer failed to generate an item.
    pub fn producer_fault(&self) {
        self.producer_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// The consumer handled an item on the first pass.
    pub fn item_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
        self.consumed_first_pass.fetch_add(1, Ordering::Relaxed);
    }

    /// The consumer failed an item.
    pub fn consumer_fault(&self) {
        self.consumer_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed item was accepted by the error queue.
    pub fn item_escalated(&self) {
        self.escalated.fetch_add(1, Ordering::Relaxed);
    }

    /// A failed item could not be forwarded and was dropped.
    pub fn forward_dropped(&self) {
        self.forward_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// The escalator made one attempt.
    pub fn retry_attempted(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// The escalator handled an item after a consumer failure.
    pub fn item_recovered(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    /// The escalator exhausted every attempt for an item.
    pub fn item_permanently_failed(&self) {
        self.permanently_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total items produced.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Total items consumed, by either the consumer or the escalator.
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            consumed_first_pass: self.consumed_first_pass.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            producer_faults: self.producer_faults.load(Ordering::Relaxed),
            consumer_faults: self.consumer_faults.load(Ordering::Relaxed),
            escalated: self.escalated.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            permanently_failed: self.permanently_failed.load(Ordering::Relaxed),
            forward_dropped: self.forward_dropped.load(Ordering::Relaxed),
            elapsed: self.started_at.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_metrics_are_zero() {
        let snapshot = PipelineMetrics::new().snapshot();
        assert_eq!(snapshot.produced, 0);
        assert_eq!(snapshot.consumed, 0);
        assert_eq!(snapshot.permanently_failed, 0);
    }

    #[test]
    fn test_consumed_totals_both_paths() {
        let metrics = PipelineMetrics::new();
        metrics.item_consumed();
        metrics.item_consumed();
        metrics.item_recovered();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.consumed, 3);
        assert_eq!(snapshot.consumed_first_pass, 2);
        assert_eq!(snapshot.recovered, 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        if i % 2 == 0 {
                            metrics.item_consumed();
                        } else {
                            metrics.item_recovered();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.consumed(), 8000);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.consumed_first_pass + snapshot.recovered, 8000);
    }

    #[test]
    fn test_failure_counters() {
        let metrics = PipelineMetrics::new();
        metrics.producer_fault();
        metrics.consumer_fault();
        metrics.item_escalated();
        metrics.retry_attempted();
        metrics.retry_attempted();
        metrics.item_permanently_failed();
        metrics.forward_dropped();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.producer_faults, 1);
        assert_eq!(snapshot.consumer_faults, 1);
        assert_eq!(snapshot.escalated, 1);
        assert_eq!(snapshot.retry_attempts, 2);
        assert_eq!(snapshot.permanently_failed, 1);
        assert_eq!(snapshot.forward_dropped, 1);
    }
}
