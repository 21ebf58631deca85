//! Randomized fault injection with an optional fixed seed.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Fault, FaultInjector};
use crate::item::{Item, Stage};

/// Default producer failure probability (producer faults are off by default).
pub const DEFAULT_PRODUCER_FAULT_RATE: f64 = 0.0;

/// Default consumer failure probability (1 in 10).
pub const DEFAULT_CONSUMER_FAULT_RATE: f64 = 0.1;

/// Default escalator failure probability per attempt (1 in 5).
pub const DEFAULT_ESCALATOR_FAULT_RATE: f64 = 0.2;

/// Per-stage failure probabilities in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultRates {
    pub producer: f64,
    pub consumer: f64,
    pub escalator: f64,
}

impl Default for FaultRates {
    fn default() -> Self {
        Self {
            producer: DEFAULT_PRODUCER_FAULT_RATE,
            consumer: DEFAULT_CONSUMER_FAULT_RATE,
            escalator: DEFAULT_ESCALATOR_FAULT_RATE,
        }
    }
}

impl FaultRates {
    /// Rates that never fail.
    pub fn none() -> Self {
        Self {
            producer: 0.0,
            consumer: 0.0,
            escalator: 0.0,
        }
    }

    /// Returns the probability for `stage`, clamped to `0.0..=1.0`.
    pub fn for_stage(&self, stage: Stage) -> f64 {
        let rate = match stage {
            Stage::Producer => self.producer,
            Stage::Consumer => self.consumer,
            Stage::Escalator => self.escalator,
        };
        if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        }
    }

    /// Returns true if every rate lies in `0.0..=1.0`.
    pub fn is_valid(&self) -> bool {
        [self.producer, self.consumer, self.escalator]
            .iter()
            .all(|rate| (0.0..=1.0).contains(rate))
    }
}

/// Fault injector that fails each call with a per-stage probability.
///
/// With a seed every decision is derived from `(seed, stage, item, attempt)`
/// alone, so a run is reproducible no matter how the stage tasks interleave.
/// Without one the generator is seeded from the OS.
#[derive(Debug)]
pub struct RandomFaults {
    rates: FaultRates,
    source: Source,
}

#[derive(Debug)]
enum Source {
    Seeded(u64),
    Entropy(Mutex<StdRng>),
}

impl RandomFaults {
    /// Creates an injector seeded from the operating system.
    pub fn new(rates: FaultRates) -> Self {
        Self {
            rates,
            source: Source::Entropy(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Creates an injector with a fixed seed.
    pub fn seeded(rates: FaultRates, seed: u64) -> Self {
        Self {
            rates,
            source: Source::Seeded(seed),
        }
    }

    /// Creates an injector from an optional seed.
    pub fn with_seed(rates: FaultRates, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(rates, seed),
            None => Self::new(rates),
        }
    }

    /// Returns the configured rates.
    pub fn rates(&self) -> FaultRates {
        self.rates
    }

    /// Returns the fixed seed, if any.
    pub fn seed(&self) -> Option<u64> {
        match self.source {
            Source::Seeded(seed) => Some(seed),
            Source::Entropy(_) => None,
        }
    }
}

/// SplitMix64 finalizer.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

fn decision_seed(seed: u64, stage: Stage, item: Item, attempt: u32) -> u64 {
    let stage_tag = match stage {
        Stage::Producer => 1,
        Stage::Consumer => 2,
        Stage::Escalator => 3,
    };
    let mut key = mix(seed ^ stage_tag);
    key = mix(key ^ item.index());
    mix(key ^ u64::from(attempt))
}

impl FaultInjector for RandomFaults {
    fn check(&self, stage: Stage, item: Item, attempt: u32) -> Result<(), Fault> {
        let rate = self.rates.for_stage(stage);
        if rate <= 0.0 {
            return Ok(());
        }
        let failed = match &self.source {
            Source::Seeded(seed) => {
                StdRng::seed_from_u64(decision_seed(*seed, stage, item, attempt)).random_bool(rate)
            }
            Source::Entropy(rng) => rng.lock().random_bool(rate),
        };
        if failed {
            Err(Fault::new(stage, item, attempt, format!("bad thing happened in {}", stage)))
        } else {
            Ok(())
        }
    }
}
