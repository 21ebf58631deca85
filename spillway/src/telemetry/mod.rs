//! Pipeline counters for end-of-run reporting.
//!
//! Stages record events on a shared [`PipelineMetrics`] using lock-free
//! atomic counters. A [`MetricsSnapshot`] is a point-in-time copy used for
//! display and assertions.
//!
//! # Architecture
//!
//! ```text
//! Producer ─┐
//! Consumer ─┼──► PipelineMetrics ──► MetricsSnapshot ──► CLI summary
//! Escalator ┘   (atomic counters)    (plain values)
//! ```
//!
//! # Example
//!
//! ```
//! use spillway::telemetry::PipelineMetrics;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(PipelineMetrics::new());
//! metrics.item_produced();
//! metrics.item_consumed();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.produced, 1);
//! assert_eq!(snapshot.consumed, 1);
//! ```

mod metrics;
mod snapshot;

pub use metrics::PipelineMetrics;
pub use snapshot::MetricsSnapshot;
