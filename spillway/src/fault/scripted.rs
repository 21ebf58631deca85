//! Deterministic, scripted fault lists.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{Fault, FaultInjector};
use crate::item::{Item, Stage};

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Fail this many more times, then succeed.
    Times(u32),
    /// Fail on every call.
    Always,
}

/// Fault injector driven by an explicit per-stage script.
///
/// Each `(stage, item)` pair can be set to fail a fixed number of times or on
/// every call. Failure budgets are consumed per call, so a script of
/// `fail_times(Stage::Escalator, 7, 2)` fails the first two escalator
/// attempts for item 7 and lets the third succeed.
#[derive(Debug, Default)]
pub struct ScriptedFaults {
    scripts: Mutex<HashMap<(Stage, u64), Script>>,
}

impl ScriptedFaults {
    /// Creates an empty script where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails `index` at `stage` for the next `times` calls.
    pub fn fail_times(self, stage: Stage, index: u64, times: u32) -> Self {
        self.scripts.lock().insert((stage, index), Script::Times(times));
        self
    }

    /// Fails `index` at `stage` on every call.
    pub fn fail_always(self, stage: Stage, index: u64) -> Self {
        self.scripts.lock().insert((stage, index), Script::Always);
        self
    }

    /// Fails every listed index once at `stage`.
    pub fn fail_once_each(self, stage: Stage, indices: impl IntoIterator<Item = u64>) -> Self {
        {
            let mut scripts = self.scripts.lock();
            for index in indices {
                scripts.insert((stage, index), Script::Times(1));
            }
        }
        self
    }

    /// Returns how many scripted failures remain for `index` at `stage`.
    ///
    /// `None` means the pair fails on every call.
    pub fn remaining(&self, stage: Stage, index: u64) -> Option<u32> {
        match self.scripts.lock().get(&(stage, index)) {
            Some(Script::Times(n)) => Some(*n),
            Some(Script::Always) => None,
            None => Some(0),
        }
    }
}

impl FaultInjector for ScriptedFaults {
    fn check(&self, stage: Stage, item: Item, attempt: u32) -> Result<(), Fault> {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(&(stage, item.index())) {
            Some(Script::Always) => Err(Fault::new(stage, item, attempt, "scripted permanent fault")),
            Some(Script::Times(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Err(Fault::new(stage, item, attempt, "scripted fault"))
            }
            _ => Ok(()),
        }
    }
}
