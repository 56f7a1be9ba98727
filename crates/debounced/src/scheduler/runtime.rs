//! Real-time scheduler backed by a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{Result, Scheduler, SchedulerError, TimerTask, TimerToken};

type TaskTable = Arc<Mutex<HashMap<u64, JoinHandle<()>>>>;

/// A scheduler that arms each timer as a sleeping task on a tokio runtime.
///
/// Every armed timer is tracked in a table keyed by its token. Firing and
/// cancelling both remove the entry under the table lock, and only the side
/// that removes it gets to act, so a cancelled task never runs even if its
/// sleep has already elapsed.
#[derive(Debug)]
pub struct TokioScheduler {
    handle: Handle,
    next_id: AtomicU64,
    tasks: TaskTable,
    max_pending: Option<usize>,
}

impl TokioScheduler {
    /// Create a scheduler on the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NoRuntime`] when called outside a tokio
    /// runtime.
    pub fn current() -> Result<Self> {
        let handle =
            Handle::try_current().map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;
        Ok(Self::from_handle(handle))
    }

    /// Create a scheduler that spawns timers on the given runtime.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            max_pending: None,
        }
    }

    /// Limit the number of simultaneously armed timers.
    #[must_use]
    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = Some(limit);
        self
    }

    fn lock(tasks: &TaskTable) -> MutexGuard<'_, HashMap<u64, JoinHandle<()>>> {
        tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokioScheduler {
    // Spawns the timer task and, under the same table lock, disarms
    // `replacing`.
    fn arm(
        &self,
        delay: Duration,
        task: TimerTask,
        replacing: Option<TimerToken>,
    ) -> Result<TimerToken> {
        let mut table = Self::lock(&self.tasks);
        if let Some(limit) = self.max_pending {
            let freed = replacing
                .filter(|t| table.contains_key(&t.id()))
                .map_or(0, |_| 1);
            if table.len() - freed >= limit {
                return Err(SchedulerError::Exhausted { limit });
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // Lost the race against cancel.
            if Self::lock(&tasks).remove(&id).is_none() {
                return;
            }
            task();
        });
        table.insert(id, join);
        trace!(token = id, ?delay, "Armed timer");

        if let Some(previous) = replacing {
            if let Some(join) = table.remove(&previous.id()) {
                join.abort();
                trace!(token = %previous, "Replaced timer");
            }
        }
        Ok(TimerToken::new(id))
    }
}

impl Scheduler for TokioScheduler {
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
        if let Some(join) = Self::lock(&self.tasks).remove(&token.id()) {
            join.abort();
            trace!(%token, "Cancelled timer");
        }
    }

    fn pending(&self) -> usize {
        Self::lock(&self.tasks).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_current_outside_runtime() {
        let err = TokioScheduler::current().unwrap_err();
        assert!(matches!(err, SchedulerError::NoRuntime(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .schedule_once(Duration::from_millis(300), counting_task(&counter))
            .unwrap();
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let scheduler = TokioScheduler::current().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let token = scheduler
            .schedule_once(Duration::from_millis(100), counting_task(&counter))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.cancel(token);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_exhausted() {
        let scheduler = TokioScheduler::current().unwrap().with_max_pending(1);
        let counter = Arc::new(AtomicUsize::new(0));

        scheduler
            .schedule_once(Duration::from_millis(10), counting_task(&counter))
            .unwrap();
        let err = scheduler
            .schedule_once(Duration::from_millis(10), counting_task(&counter))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Exhausted { limit: 1 }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Capacity frees up once the first timer fired.
        scheduler
            .schedule_once(Duration::from_millis(10), counting_task(&counter))
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_at_capacity() {
        let scheduler = TokioScheduler::current().unwrap().with_max_pending(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let mut token = scheduler
            .schedule_once(Duration::from_millis(100), counting_task(&counter))
            .unwrap();
        for _ in 0..5 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token = scheduler
                .reschedule(token, Duration::from_millis(100), counting_task(&counter))
                .unwrap();
            assert_eq!(scheduler.pending(), 1);
        }

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }
}
