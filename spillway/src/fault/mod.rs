//! Fault injection for pipeline stages.
//!
//! Every stage asks a [`FaultInjector`] whether the current item fails before
//! counting it as handled. This is the only non-deterministic input to the
//! pipeline, so it sits behind a trait:
//!
//! - [`NeverFail`]: every item succeeds.
//! - [`ScriptedFaults`]: explicit per-stage fault lists for deterministic tests.
//! - [`RandomFaults`]: per-stage failure rates from a seedable generator.
//! - [`fault_fn`]: any closure.
//!
//! # Example
//!
//! ```
//! use spillway::fault::{FaultInjector, ScriptedFaults};
//! use spillway::{Item, Stage};
//!
//! let faults = ScriptedFaults::new().fail_times(Stage::Consumer, 1, 1);
//!
//! assert!(faults.check(Stage::Consumer, Item::new(1), 0).is_err());
//! assert!(faults.check(Stage::Escalator, Item::new(1), 0).is_ok());
//! ```

mod random;
mod scripted;

use std::fmt;

use crate::item::{Item, Stage};

pub use random::{FaultRates, RandomFaults};
pub use scripted::ScriptedFaults;

/// A transient failure raised while handling an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Stage that observed the failure.
    pub stage: Stage,
    /// Item being handled.
    pub item: Item,
    /// Attempt number within the stage. Single-shot stages pass 0, the
    /// escalator counts from 1.
    pub attempt: u32,
    /// Human-readable cause.
    pub reason: String,
}

impl Fault {
    /// Creates a fault for the given stage, item and attempt.
    pub fn new(stage: Stage, item: Item, attempt: u32, reason: impl Into<String>) -> Self {
        Self {
            stage,
            item,
            attempt,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed on item {} (attempt {}): {}",
            self.stage, self.item, self.attempt, self.reason
        )
    }
}

impl std::error::Error for Fault {}

/// Decides whether handling an item fails.
///
/// Called once per producer item, once per consumer item and once per
/// escalator attempt. Implementations must be cheap and non-blocking.
pub trait FaultInjector: Send + Sync {
    /// Returns `Err` if handling `item` at `stage` should fail this time.
    fn check(&self, stage: Stage, item: Item, attempt: u32) -> Result<(), Fault>;
}

/// Injector that never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverFail;

impl FaultInjector for NeverFail {
    fn check(&self, _stage: Stage, _item: Item, _attempt: u32) -> Result<(), Fault> {
        Ok(())
    }
}

/// Injector backed by a closure.
///
/// Created with [`fault_fn`].
#[derive(Clone, Copy)]
pub struct FaultFn<F> {
    f: F,
}

/// Wraps a closure as a [`FaultInjector`].
pub fn fault_fn<F>(f: F) -> FaultFn<F>
where
    F: Fn(Stage, Item, u32) -> Result<(), Fault> + Send + Sync,
{
    FaultFn { f }
}

impl<F> FaultInjector for FaultFn<F>
where
    F: Fn(Stage, Item, u32) -> Result<(), Fault> + Send + Sync,
{
    fn check(&self, stage: Stage, item: Item, attempt: u32) -> Result<(), Fault> {
        (self.f)(stage, item, attempt)
    }
}

impl<F> fmt::Debug for FaultFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_never_fail() {
        let injector = NeverFail;
        for stage in Stage::ALL {
            assert!(injector.check(stage, Item::new(0), 0).is_ok());
        }
    }

    #[test]
    fn test_closure_injector() {
        let injector = fault_fn(|stage, item: Item, attempt| {
            if item.index() % 2 == 0 {
                Err(Fault::new(stage, item, attempt, "even"))
            } else {
                Ok(())
            }
        });
        let injector: Arc<dyn FaultInjector> = Arc::new(injector);

        assert!(injector.check(Stage::Consumer, Item::new(1), 0).is_ok());
        let fault = injector.check(Stage::Consumer, Item::new(2), 0).unwrap_err();
        assert_eq!(fault.item, Item::new(2));
        assert_eq!(fault.reason, "even");
    }

    #[test]
    fn test_fault_display() {
        let fault = Fault::new(Stage::Escalator, Item::new(4), 2, "boom");
        assert_eq!(fault.to_string(), "escalator failed on item #4 (attempt 2): boom");
    }
}
