//! Virtual-clock scheduler.
//!
//! Time only moves when [`ManualScheduler::advance`] (or one of its
//! siblings) is called, which makes timing behavior reproducible in tests
//! and scripted simulations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use super::{Result, Scheduler, SchedulerError, TimerTask, TimerToken};

/// A scheduler driven by an explicit virtual clock.
///
/// Timers due at the same instant fire in the order they were armed. Tasks
/// run on the thread calling `advance*`, without any scheduler lock held, so
/// a task may arm or cancel timers itself.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    max_pending: Option<usize>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), TimerTask>,
    deadlines: HashMap<u64, Duration>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero with no timer limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of simultaneously armed timers.
    #[must_use]
    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = Some(limit);
        self
    }

    /// Current virtual time, measured from creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Move the clock forward by `by`, firing every timer that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.now() + by;
        self.advance_to(target);
    }

    /// Move the clock forward to `target`, firing every timer due at or
    /// before it. A target in the past leaves the clock where it is.
    pub fn advance_to(&self, target: Duration) {
        while let Some(task) = self.pop_due(target) {
            task();
        }
        let mut state = self.lock();
        if target > state.now {
            state.now = target;
        }
    }

    /// Fire timers in deadline order until none are armed, including timers
    /// armed by the tasks themselves. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let state = self.lock();
                state.queue.keys().next().map(|(deadline, _)| *deadline)
            };
            let Some(deadline) = next else {
                return fired;
            };
            while let Some(task) = self.pop_due(deadline) {
                task();
                fired += 1;
            }
        }
    }

    fn pop_due(&self, target: Duration) -> Option<TimerTask> {
        let mut state = self.lock();
        let key = *state.queue.keys().next()?;
        if key.0 > target {
            return None;
        }
        let task = state.queue.remove(&key)?;
        state.deadlines.remove(&key.1);
        if key.0 > state.now {
            state.now = key.0;
        }
        trace!(token = key.1, at = ?key.0, "Firing virtual timer");
        Some(task)
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Arms a timer and, under the same lock, disarms `replacing`.
    fn arm(
        &self,
        delay: Duration,
        task: TimerTask,
        replacing: Option<TimerToken>,
    ) -> Result<TimerToken> {
        let mut state = self.lock();
        if let Some(limit) = self.max_pending {
            let freed = replacing
                .filter(|t| state.deadlines.contains_key(&t.id()))
                .map_or(0, |_| 1);
            if state.queue.len() - freed >= limit {
                return Err(SchedulerError::Exhausted { limit });
            }
        }
        let id = state.next_id;
        state.next_id += 1;
        let deadline = state.now + delay;
        state.queue.insert((deadline, id), task);
        state.deadlines.insert(id, deadline);
        if let Some(previous) = replacing {
            state.disarm(previous);
        }
        Ok(TimerToken::new(id))
    }
}

impl ManualState {
    fn disarm(&mut self, token: TimerToken) {
        if let Some(deadline) = self.deadlines.remove(&token.id()) {
            self.queue.remove(&(deadline, token.id()));
            trace!(%token, "Cancelled virtual timer");
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> Result<TimerToken> {
        self.arm(delay, task, None)
    }

    fn reschedule(
        &self,
        previous: TimerToken,
        delay: Duration,
        task: TimerTask,
    ) -> Result<TimerToken> {
        self.arm(delay, task, Some(previous))
    }

    fn cancel(&self, token: TimerToken) {
        self.lock().disarm(token);
    }

    fn pending(&self) -> usize {
        self.lock().queue.len()
    }
}
