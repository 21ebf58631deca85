//! The producer, consumer, escalator pipeline.
//!
//! ```text
//! Producer ──► [primary queue] ──► Consumer ──fail──► [error queue] ──► Escalator
//!  (0..N)                            │                                   │
//!                                    ▼                                   ▼
//!                                 consumed                  recovered or permanently failed
//! ```
//!
//! Per-item faults are contained in the stage that observes them. Only
//! structural faults (a broken queue contract or a panicking stage) fail
//! [`Pipeline::run`].

mod config;
mod error;
mod orchestrator;
pub mod stages;

pub use config::{
    ForwardPolicy, PipelineConfig, DEFAULT_ITEM_COUNT, DEFAULT_PRODUCTION_DELAY_MS,
    DEFAULT_QUEUE_CAPACITY,
};
pub use error::PipelineError;
pub use orchestrator::{Pipeline, PipelineReport};
pub use stages::{Consumer, Escalator, Producer, StageContext};
