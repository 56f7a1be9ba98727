//! Timer facility abstraction.
//!
//! This module defines the one-shot timer contract the debounced value is
//! built on, together with two implementations:
//! - [`TokioScheduler`] arms real timers on a tokio runtime.
//! - [`ManualScheduler`] runs a virtual clock that only moves when told to.

mod manual;
mod runtime;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// Errors that can occur while arming a timer.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler refused a new timer because it is at capacity.
    #[error("timer capacity exhausted ({limit} pending)")]
    Exhausted {
        /// The configured maximum number of pending timers.
        limit: usize,
    },

    /// No async runtime is available to drive timers.
    #[error("no runtime available: {0}")]
    NoRuntime(String),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Work run once when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle to an armed timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// A facility for one-shot, cancellable timers.
///
/// Implementors must make cancellation synchronous: once [`cancel`] returns,
/// the task registered under that token never runs. Neither method may block
/// waiting for a timer to elapse.
///
/// [`cancel`]: Scheduler::cancel
pub trait Scheduler: Send + Sync {
    /// Arm a timer that runs `task` once after `delay`.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer cannot be armed. No timer is left
    /// pending in that case.
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> Result<TimerToken>;

    /// Arm a timer that takes the place of `previous`.
    ///
    /// `previous` is cancelled only after the new timer is armed, and its
    /// slot counts towards any capacity limit, so replacing a timer never
    /// needs more than one slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the new timer cannot be armed. `previous` stays
    /// armed in that case.
    fn reschedule(
        &self,
        previous: TimerToken,
        delay: Duration,
        task: TimerTask,
    ) -> Result<TimerToken> {
        let token = self.schedule_once(delay, task)?;
        self.cancel(previous);
        Ok(token)
    }

    /// Disarm a timer. Cancelling a token that already fired or was already
    /// cancelled is a no-op.
    fn cancel(&self, token: TimerToken);

    /// Number of timers currently armed.
    fn pending(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_token_display() {
        assert_eq!(TimerToken::new(7).to_string(), "timer#7");
    }

    #[test]
    fn test_scheduler_error_display() {
        assert!(SchedulerError::Exhausted { limit: 2 }
            .to_string()
            .contains("capacity"));
        assert!(SchedulerError::NoRuntime("outside runtime".to_string())
            .to_string()
            .contains("outside runtime"));
    }
}
