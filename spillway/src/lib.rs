//! Spillway - a bounded producer, consumer, escalator pipeline
//!
//! Items flow from a producer through a bounded primary queue to a consumer.
//! Items the consumer fails spill over into a bounded error queue where an
//! escalator retries them a limited number of times before recording a
//! permanent failure. Termination is driven by closing each queue once its
//! writer is done.
//!
//! # Modules
//!
//! - [`queue`]: single-writer, single-reader FIFO queues with backpressure
//! - [`pipeline`]: the three stages and the orchestrator that joins them
//! - [`fault`]: pluggable fault injection (scripted, seeded random, closure)
//! - [`retry`]: retry policies and per-item retry state
//! - [`observer`]: per-item event sink
//! - [`telemetry`]: atomic counters and end-of-run snapshots
//! - [`config`]: INI configuration file
//! - [`logging`]: `tracing` subscriber setup
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use spillway::{Pipeline, PipelineConfig, ScriptedFaults, Stage};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let faults = ScriptedFaults::new().fail_once_each(Stage::Consumer, [1, 3]);
//! let pipeline = Pipeline::new(PipelineConfig::new(5).with_production_delay(Duration::ZERO))
//!     .unwrap()
//!     .with_faults(Arc::new(faults));
//!
//! let report = pipeline.run().await.unwrap();
//! assert_eq!(report.metrics.produced, 5);
//! assert_eq!(report.metrics.consumed, 5);
//! # });
//! ```

pub mod config;
pub mod fault;
pub mod item;
pub mod logging;
pub mod observer;
pub mod pipeline;
pub mod queue;
pub mod retry;
pub mod telemetry;

pub use config::{ConfigError, ConfigFile};
pub use fault::{Fault, FaultInjector, NeverFail, RandomFaults, ScriptedFaults};
pub use item::{Item, Stage};
pub use observer::{PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver};
pub use pipeline::{ForwardPolicy, Pipeline, PipelineConfig, PipelineError, PipelineReport};
pub use queue::{BoundedQueue, QueueCapacity, QueueError};
pub use retry::RetryPolicy;
pub use telemetry::MetricsSnapshot;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
