//! Run command - execute the pipeline once and print a summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use spillway::config::{ConfigFile, FaultMode};
use spillway::logging::init_logging;
use spillway::pipeline::{ForwardPolicy, Pipeline};
use spillway::queue::QueueCapacity;
use spillway::retry::RetryPolicy;
use spillway::TracingObserver;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

/// Arguments for the run command. `None` keeps the config file value.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub items: Option<u64>,
    pub capacity: Option<usize>,
    pub error_capacity: Option<usize>,
    pub unbounded: bool,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub seed: Option<u64>,
    pub no_faults: bool,
    pub best_effort: bool,
    pub log_level: Option<String>,
}

impl RunArgs {
    /// Applies command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut ConfigFile) {
        let pipeline = &mut config.pipeline;
        if let Some(items) = self.items {
            pipeline.item_count = items;
        }
        if let Some(capacity) = self.capacity {
            pipeline.primary_capacity = QueueCapacity::from_size(capacity);
            pipeline.error_capacity = QueueCapacity::from_size(capacity);
        }
        if let Some(capacity) = self.error_capacity {
            pipeline.error_capacity = QueueCapacity::from_size(capacity);
        }
        if self.unbounded {
            pipeline.primary_capacity = QueueCapacity::Unbounded;
            pipeline.error_capacity = QueueCapacity::Unbounded;
        }
        if let Some(max_attempts) = self.max_attempts {
            pipeline.retry = pipeline.retry.clone().with_max_attempts(max_attempts);
        }
        if let Some(ms) = self.retry_delay_ms {
            pipeline.retry = RetryPolicy::fixed(pipeline.retry.max_attempts(), Duration::from_millis(ms));
        }
        if let Some(ms) = self.delay_ms {
            pipeline.production_delay = Duration::from_millis(ms);
        }
        if self.best_effort {
            pipeline.forward_policy = ForwardPolicy::BestEffort;
        }
        if self.seed.is_some() {
            config.faults.seed = self.seed;
        }
        if self.no_faults {
            config.faults.mode = FaultMode::None;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

/// Run the pipeline.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let mut config = ConfigFile::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.pipeline.validate()?;

    let _logging = init_logging(&config.logging)?;

    let pipeline = Pipeline::new(config.pipeline.clone())?
        .with_faults(config.faults.injector())
        .with_observer(Arc::new(TracingObserver));

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received shutdown signal, stopping pipeline...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    info!(
        items = config.pipeline.item_count,
        faults = %config.faults.mode,
        "running pipeline"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let report = runtime.block_on(pipeline.run_with_cancellation(cancel))?;

    println!("{}", report.metrics);
    for item in &report.permanently_failed {
        println!("Permanently failed: item {}", item);
    }
    if report.cancelled {
        println!("Run cancelled before all items were processed.");
    }
    println!("Done");

    Ok(())
}
