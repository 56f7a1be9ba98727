//! The debounced value primitive.
//!
//! A [`DebouncedValue`] holds a rapidly changing source value and exposes a
//! derived, observed value that only catches up once the source has been
//! quiet for the configured delay. Bursts of updates collapse into a single
//! propagation timed from the last update in the burst.
//!
//! Each armed timer carries a generation number. The fire callback compares
//! it with the generation of the currently pending timer and does nothing on
//! a mismatch, so a superseded or cancelled timer can never notify even if
//! the scheduler already started running it.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::delay::Delay;
use crate::equality::{EqualityPolicy, ValueEq};
use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, TimerTask, TimerToken};

/// Callback invoked with each newly observed value.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Identifies a listener registered with [`DebouncedValue::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A timer was armed (replacing any pending one).
    Scheduled,
    /// The value repeated the current source and was skipped.
    Unchanged,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    token: TimerToken,
    generation: u64,
}

struct State<T> {
    source: T,
    observed: T,
    delay: Delay,
    pending: Option<PendingTimer>,
    generation: u64,
    disposed: bool,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_subscription: u64,
    notifications: u64,
    delivering_on: Option<ThreadId>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    // Held for the whole of a delivery so notifications never overlap and
    // dispose can wait for one in flight.
    delivery: Mutex<()>,
    watch_tx: watch::Sender<T>,
}

impl<T> Shared<T> {
    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn fire(&self, generation: u64) {
        let _delivery = self.lock_delivery();
        let (value, listeners, sequence) = {
            let mut state = self.lock_state();
            let current = state.pending.map(|p| p.generation);
            if state.disposed || current != Some(generation) {
                trace!(generation, ?current, "Ignoring stale timer");
                return;
            }
            state.pending = None;
            state.observed = state.source.clone();
            state.notifications += 1;
            state.delivering_on = Some(thread::current().id());
            // Published under the lock: once `pending` reads empty, watchers
            // already have the value.
            self.watch_tx.send_replace(state.observed.clone());
            let listeners: Vec<Listener<T>> =
                state.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (state.observed.clone(), listeners, state.notifications)
        };

        debug!(generation, sequence, listeners = listeners.len(), "Value settled");
        for listener in &listeners {
            listener(&value);
        }
        self.lock_state().delivering_on = None;
    }
}

/// A value that trails its source by a quiet window.
///
/// The owner calls [`update`](Self::update) on every raw change and reads
/// [`observed`](Self::observed) (or subscribes) for the settled value.
/// Dropping the handle disposes it: any pending timer is cancelled and no
/// notification is delivered afterwards.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use debounced::{DebouncedValue, ManualScheduler};
///
/// let clock = Arc::new(ManualScheduler::new());
/// let search = DebouncedValue::new(String::new(), 300_i64, clock.clone())?;
///
/// search.update("ab".to_string())?;
/// clock.advance(Duration::from_millis(100));
/// search.update("abc".to_string())?;
///
/// clock.advance(Duration::from_millis(299));
/// assert_eq!(search.observed(), "");
/// clock.advance(Duration::from_millis(1));
/// assert_eq!(search.observed(), "abc");
/// # Ok::<(), debounced::Error>(())
/// ```
pub struct DebouncedValue<T, E = ValueEq>
where
    T: Clone + Send + Sync + 'static,
    E: EqualityPolicy<T>,
{
    shared: Arc<Shared<T>>,
    scheduler: Arc<dyn Scheduler>,
    equality: E,
}

impl<T> DebouncedValue<T, ValueEq>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a debounced value using structural equality to skip repeats.
    ///
    /// The observed value starts out as `initial`; no timer is armed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `delay` is negative.
    pub fn new<D>(initial: T, delay: D, scheduler: Arc<dyn Scheduler>) -> Result<Self>
    where
        D: TryInto<Delay>,
        D::Error: Into<Error>,
    {
        Self::with_equality(initial, delay, scheduler, ValueEq)
    }
}

impl<T, E> DebouncedValue<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: EqualityPolicy<T>,
{
    /// Create a debounced value with an explicit equality policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `delay` is negative.
    pub fn with_equality<D>(
        initial: T,
        delay: D,
        scheduler: Arc<dyn Scheduler>,
        equality: E,
    ) -> Result<Self>
    where
        D: TryInto<Delay>,
        D::Error: Into<Error>,
    {
        let delay = delay.try_into().map_err(Into::<Error>::into)?;
        let (watch_tx, _) = watch::channel(initial.clone());
        let state = State {
            source: initial.clone(),
            observed: initial,
            delay,
            pending: None,
            generation: 0,
            disposed: false,
            listeners: Vec::new(),
            next_subscription: 0,
            notifications: 0,
            delivering_on: None,
        };
        debug!(%delay, "Created debounced value");
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                delivery: Mutex::new(()),
                watch_tx,
            }),
            scheduler,
            equality,
        })
    }

    /// Record a new source value.
    ///
    /// A value the equality policy deems equal to the current source is
    /// skipped. Otherwise a timer is armed for the current delay, any
    /// previously pending timer is cancelled, and the value becomes the new
    /// source. The observed value does not change here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduling`] if the timer cannot be armed; the
    /// source, observed value and pending timer are left as they were.
    pub fn update(&self, value: T) -> Result<UpdateOutcome> {
        let mut state = self.shared.lock_state();
        if self.equality.same(&state.source, &value) {
            trace!("Skipping update equal to current source");
            return Ok(UpdateOutcome::Unchanged);
        }

        let delay = state.delay;
        self.rearm(&mut state, delay)?;
        state.source = value;
        Ok(UpdateOutcome::Scheduled)
    }

    /// Change the quiet window.
    ///
    /// If a timer is pending it is rescheduled to fire the new delay from
    /// now, even when the delay is unchanged. The new delay applies to every
    /// later update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `delay` is negative, or
    /// [`Error::Scheduling`] if the replacement timer cannot be armed. In
    /// both cases the previous delay and pending timer are kept.
    pub fn set_delay<D>(&self, delay: D) -> Result<()>
    where
        D: TryInto<Delay>,
        D::Error: Into<Error>,
    {
        let delay = delay.try_into().map_err(Into::<Error>::into)?;
        let mut state = self.shared.lock_state();
        if state.pending.is_some() {
            self.rearm(&mut state, delay)?;
        }
        debug!(from = %state.delay, to = %delay, "Changed delay");
        state.delay = delay;
        Ok(())
    }

    // A pending timer is swapped out by the scheduler, which keeps it armed
    // if the replacement fails.
    fn rearm(&self, state: &mut State<T>, delay: Delay) -> Result<()> {
        let generation = state.generation + 1;
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        let task: TimerTask = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.fire(generation);
            }
        });
        let armed = match state.pending {
            Some(previous) => self
                .scheduler
                .reschedule(previous.token, delay.as_duration(), task),
            None => self.scheduler.schedule_once(delay.as_duration(), task),
        };
        let token = armed.map_err(|e| {
            debug!(error = %e, "Failed to arm timer");
            Error::from(e)
        })?;

        state.pending = Some(PendingTimer { token, generation });
        state.generation = generation;
        trace!(%token, generation, %delay, "Armed debounce timer");
        Ok(())
    }

    /// The settled value consumers should render or query with.
    #[must_use]
    pub fn observed(&self) -> T {
        self.shared.lock_state().observed.clone()
    }

    /// The most recently recorded source value.
    #[must_use]
    pub fn source(&self) -> T {
        self.shared.lock_state().source.clone()
    }

    /// The current quiet window.
    #[must_use]
    pub fn delay(&self) -> Delay {
        self.shared.lock_state().delay
    }

    /// Whether a propagation is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.lock_state().pending.is_some()
    }

    /// Number of notifications delivered so far.
    #[must_use]
    pub fn notification_count(&self) -> u64 {
        self.shared.lock_state().notifications
    }

    /// Register a listener called with each newly observed value.
    ///
    /// Listeners run on whichever thread fires the timer, without the
    /// value's internal state lock held.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut state = self.shared.lock_state();
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        state.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.shared.lock_state();
        let before = state.listeners.len();
        state.listeners.retain(|(existing, _)| *existing != id);
        state.listeners.len() != before
    }

    /// A receiver that observes every settled value.
    ///
    /// The channel closes once the value is disposed.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<T> {
        self.shared.watch_tx.subscribe()
    }

    /// Cancel any pending timer and stop all notifications.
    ///
    /// When this returns, no listener will be invoked again. A delivery
    /// already running on another thread is waited for.
    pub fn dispose(self) {
        drop(self);
    }

    fn shutdown(&self) {
        let wait_for_delivery = {
            let mut state = self.shared.lock_state();
            if state.disposed {
                return;
            }
            state.disposed = true;
            if let Some(pending) = state.pending.take() {
                self.scheduler.cancel(pending.token);
                debug!(token = %pending.token, "Cancelled pending timer on dispose");
            }
            state.listeners.clear();
            state.delivering_on != Some(thread::current().id())
        };
        if wait_for_delivery {
            drop(self.shared.lock_delivery());
        }
        trace!("Disposed debounced value");
    }
}

impl<T, E> Drop for DebouncedValue<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: EqualityPolicy<T>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T, E> fmt::Debug for DebouncedValue<T, E>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
    E: EqualityPolicy<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("DebouncedValue")
            .field("source", &state.source)
            .field("observed", &state.observed)
            .field("delay", &state.delay)
            .field("pending", &state.pending.is_some())
            .field("notifications", &state.notifications)
            .finish_non_exhaustive()
    }
}
