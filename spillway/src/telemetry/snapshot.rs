//! Point-in-time view of the pipeline counters.

use std::fmt;
use std::time::Duration;

/// Copy of [`PipelineMetrics`](super::PipelineMetrics) at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Items the producer generated and enqueued.
    pub produced: u64,
    /// Items handled by the consumer or the escalator.
    pub consumed: u64,
    /// Items handled by the consumer on the first pass.
    pub consumed_first_pass: u64,
    /// Items handled by the escalator after a consumer failure.
    pub recovered: u64,
    /// Items the producer failed to generate.
    pub producer_faults: u64,
    /// Items the consumer failed.
    pub consumer_faults: u64,
    /// Failed items accepted by the error queue.
    pub escalated: u64,
    /// Escalator attempts, successful or not.
    pub retry_attempts: u64,
    /// Items that exhausted every escalator attempt.
    pub permanently_failed: u64,
    /// Failed items dropped because the error queue was full.
    pub forward_dropped: u64,
    /// Time since the counters were created.
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Fraction of produced items that were eventually consumed.
    ///
    /// Returns 1.0 when nothing was produced.
    pub fn success_rate(&self) -> f64 {
        if self.produced == 0 {
            1.0
        } else {
            self.consumed as f64 / self.produced as f64
        }
    }

    /// Items that reached a terminal state.
    pub fn settled(&self) -> u64 {
        self.consumed + self.permanently_failed + self.forward_dropped
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Produced: {}", self.produced)?;
        writeln!(f, "Total Consumed: {}", self.consumed)?;
        writeln!(
            f,
            "  first pass: {}, recovered: {}, permanently failed: {}, dropped: {}",
            self.consumed_first_pass, self.recovered, self.permanently_failed, self.forward_dropped
        )?;
        write!(
            f,
            "  faults: producer {}, consumer {} | retries: {} | {:.1}% consumed in {:.2}s",
            self.producer_faults,
            self.consumer_faults,
            self.retry_attempts,
            self.success_rate() * 100.0,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let snapshot = MetricsSnapshot {
            produced: 4,
            consumed: 3,
            ..Default::default()
        };
        assert_eq!(snapshot.success_rate(), 0.75);
        assert_eq!(MetricsSnapshot::default().success_rate(), 1.0);
    }

    #[test]
    fn test_settled() {
        let snapshot = MetricsSnapshot {
            produced: 10,
            consumed: 7,
            permanently_failed: 2,
            forward_dropped: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.settled(), 10);
    }

    #[test]
    fn test_display_leads_with_totals() {
        let snapshot = MetricsSnapshot {
            produced: 100,
            consumed: 98,
            ..Default::default()
        };
        let text = snapshot.to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Total Produced: 100"));
        assert_eq!(lines.next(), Some("Total Consumed: 98"));
        assert!(text.contains("98.0% consumed"));
    }
}
