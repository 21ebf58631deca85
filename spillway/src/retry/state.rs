//! Per-item retry state machine.
//!
//! ```text
//! Pending(attempts = 0) --failure--> Pending(attempts = 1) --failure--> ...
//!        |                                  |
//!     success                            success
//!        v                                  v
//!    Succeeded                          Succeeded
//!
//! Pending(attempts = max - 1) --failure--> PermanentlyFailed
//! ```

use crate::fault::Fault;

/// Terminal outcome of retrying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// An attempt succeeded. `attempts` counts every attempt made, including
    /// the successful one.
    Succeeded { attempts: u32 },

    /// Every attempt failed.
    PermanentlyFailed { attempts: u32, last_fault: Fault },
}

impl RetryOutcome {
    /// Returns true if the item was eventually handled.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Returns the number of attempts made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts } => *attempts,
            Self::PermanentlyFailed { attempts, .. } => *attempts,
        }
    }
}

/// Attempt bookkeeping for a single escalated item.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    finished: bool,
}

impl RetryState {
    /// Creates a state allowing up to `max_attempts` attempts.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0.
    pub fn new(max_attempts: u32) -> Self {
        assert!(max_attempts > 0, "max_attempts must be at least 1");
        Self {
            attempts: 0,
            max_attempts,
            finished: false,
        }
    }

    /// Returns the index of the next attempt, or `None` once terminal.
    pub fn next_attempt(&self) -> Option<u32> {
        if self.finished || self.attempts >= self.max_attempts {
            None
        } else {
            Some(self.attempts)
        }
    }

    /// Number of attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true once an outcome has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records a successful attempt.
    ///
    /// # Panics
    ///
    /// Panics if the state is already terminal.
    pub fn record_success(&mut self) -> RetryOutcome {
        assert!(self.next_attempt().is_some(), "retry state already finished");
        self.attempts += 1;
        self.finished = true;
        RetryOutcome::Succeeded {
            attempts: self.attempts,
        }
    }

    /// Records a failed attempt.
    ///
    /// Returns `Some(PermanentlyFailed)` when this was the last allowed
    /// attempt, `None` if another attempt may follow.
    ///
    /// # Panics
    ///
    /// Panics if the state is already terminal.
    pub fn record_failure(&mut self, fault: Fault) -> Option<RetryOutcome> {
        assert!(self.next_attempt().is_some(), "retry state already finished");
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            self.finished = true;
            Some(RetryOutcome::PermanentlyFailed {
                attempts: self.attempts,
                last_fault: fault,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Item, Stage};

    fn fault(attempt: u32) -> Fault {
        Fault::new(Stage::Escalator, Item::new(1), attempt, "test")
    }

    #[test]
    fn test_success_on_first_attempt() {
        let mut state = RetryState::new(3);
        assert_eq!(state.next_attempt(), Some(0));
        assert_eq!(state.record_success(), RetryOutcome::Succeeded { attempts: 1 });
        assert!(state.is_finished());
        assert_eq!(state.next_attempt(), None);
    }

    #[test]
    fn test_success_after_failures() {
        let mut state = RetryState::new(3);
        assert_eq!(state.record_failure(fault(0)), None);
        assert_eq!(state.next_attempt(), Some(1));
        assert_eq!(state.record_failure(fault(1)), None);
        let outcome = state.record_success();
        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
    }

    #[test]
    fn test_exhaustion() {
        let mut state = RetryState::new(3);
        assert_eq!(state.record_failure(fault(0)), None);
        assert_eq!(state.record_failure(fault(1)), None);
        let outcome = state.record_failure(fault(2)).expect("third failure is terminal");
        assert_eq!(
            outcome,
            RetryOutcome::PermanentlyFailed {
                attempts: 3,
                last_fault: fault(2),
            }
        );
        assert_eq!(state.next_attempt(), None);
    }

    #[test]
    fn test_single_attempt_policy() {
        let mut state = RetryState::new(1);
        assert!(state.record_failure(fault(0)).is_some());
    }

    #[test]
    #[should_panic(expected = "retry state already finished")]
    fn test_record_after_finish_panics() {
        let mut state = RetryState::new(1);
        state.record_success();
        state.record_success();
    }

    #[test]
    #[should_panic(expected = "max_attempts must be at least 1")]
    fn test_zero_attempts_panics() {
        RetryState::new(0);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_outcome_respects_attempt_limit(
                max_attempts in 1u32..10,
                results in proptest::collection::vec(any::<bool>(), 1..20),
            ) {
                let mut state = RetryState::new(max_attempts);
                let mut outcome = None;
                for (i, ok) in results.iter().enumerate() {
                    let Some(attempt) = state.next_attempt() else { break };
                    prop_assert_eq!(attempt as usize, i);
                    if *ok {
                        outcome = Some(state.record_success());
                    } else {
                        outcome = state.record_failure(fault(attempt));
                    }
                    if outcome.is_some() {
                        break;
                    }
                }

                prop_assert!(state.attempts() <= max_attempts);
                if let Some(outcome) = outcome {
                    prop_assert!(state.is_finished());
                    match outcome {
                        RetryOutcome::Succeeded { attempts } => {
                            prop_assert!(results[attempts as usize - 1]);
                        }
                        RetryOutcome::PermanentlyFailed { attempts, .. } => {
                            prop_assert_eq!(attempts, max_attempts);
                            prop_assert!(results[..attempts as usize].iter().all(|ok| !ok));
                        }
                    }
                }
            }
        }
    }
}
