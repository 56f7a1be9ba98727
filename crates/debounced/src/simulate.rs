//! Scripted, deterministic replay of timed updates.
//!
//! A script is a list of steps `<ms>:<action>`, separated by whitespace or
//! commas:
//!
//! - `100:abc` records the update `abc` at t=100ms,
//! - `200:~500` changes the delay to 500ms at t=200ms,
//! - `300:!dispose` disposes the value at t=300ms.
//!
//! Steps run against a [`ManualScheduler`], so the resulting trace is exact
//! and repeatable.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::debounce::{DebouncedValue, UpdateOutcome};
use crate::equality::EqualityMode;
use crate::error::{Error, Result};
use crate::scheduler::ManualScheduler;

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Record a new source value.
    Update(String),
    /// Change the delay, in signed milliseconds.
    SetDelay(i64),
    /// Dispose the value.
    Dispose,
}

/// One timed step of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Virtual time the step is applied at.
    pub at: Duration,
    /// The action to apply.
    pub action: Action,
}

/// A parsed script, ordered by time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    /// The steps in the order they will be applied.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl FromStr for Script {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut steps = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .enumerate()
            .map(|(index, token)| parse_step(index + 1, token))
            .collect::<Result<Vec<_>>>()?;
        // Stable, so steps sharing a time keep their written order.
        steps.sort_by_key(|step| step.at);
        Ok(Self { steps })
    }
}

fn parse_step(index: usize, token: &str) -> Result<Step> {
    let (at, action) = token.split_once(':').ok_or_else(|| {
        Error::invalid_argument(format!("step {index} ({token}): expected <ms>:<action>"))
    })?;
    let at = at.parse::<u64>().map_err(|e| {
        Error::invalid_argument(format!("step {index} ({token}): bad time '{at}': {e}"))
    })?;

    let action = if let Some(directive) = action.strip_prefix('!') {
        match directive {
            "dispose" => Action::Dispose,
            other => {
                return Err(Error::invalid_argument(format!(
                    "step {index} ({token}): unknown directive '!{other}'"
                )))
            }
        }
    } else if let Some(millis) = action.strip_prefix('~') {
        Action::SetDelay(millis.parse::<i64>().map_err(|e| {
            Error::invalid_argument(format!("step {index} ({token}): bad delay '{millis}': {e}"))
        })?)
    } else if action.is_empty() {
        return Err(Error::invalid_argument(format!(
            "step {index} ({token}): missing value"
        )));
    } else {
        Action::Update(action.to_string())
    };

    Ok(Step {
        at: Duration::from_millis(at),
        action,
    })
}

/// Kind of a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An update armed a timer.
    Update,
    /// An update repeated the current source and was skipped.
    Skip,
    /// The delay changed.
    Delay,
    /// The value was disposed.
    Dispose,
    /// The observed value changed.
    Notify,
    /// A step was rejected.
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "update"),
            Self::Skip => write!(f, "skip"),
            Self::Delay => write!(f, "delay"),
            Self::Dispose => write!(f, "dispose"),
            Self::Notify => write!(f, "notify"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One line of a simulation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    /// Virtual time in milliseconds.
    pub at_ms: u64,
    /// What happened.
    pub kind: EventKind,
    /// The value, delay or error message involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}ms  {:<8}", self.at_ms, self.kind.to_string())?;
        if let Some(value) = &self.value {
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

/// Parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    /// Initial delay in signed milliseconds.
    pub delay_ms: i64,
    /// How repeated values are detected.
    pub equality: EqualityMode,
    /// Stop at this virtual time instead of running until idle. Steps after
    /// it are not applied.
    pub until: Option<Duration>,
    /// Timer capacity of the virtual scheduler.
    pub max_pending: Option<usize>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            delay_ms: 300,
            equality: EqualityMode::Value,
            until: None,
            max_pending: None,
        }
    }
}

type Trace = Arc<Mutex<Vec<TraceEvent>>>;

fn millis(at: Duration) -> u64 {
    u64::try_from(at.as_millis()).unwrap_or(u64::MAX)
}

fn record(trace: &Trace, at: Duration, kind: EventKind, value: Option<String>) {
    trace
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(TraceEvent {
            at_ms: millis(at),
            kind,
            value,
        });
}

/// Replay `script` and return the trace, ordered by time.
///
/// Rejected steps (a negative delay, a step after disposal, a timer that
/// could not be armed) appear as [`EventKind::Error`] events and leave the
/// value as it was.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the initial delay is negative.
pub fn run(script: &Script, options: &SimulationOptions) -> Result<Vec<TraceEvent>> {
    let clock = Arc::new(match options.max_pending {
        Some(limit) => ManualScheduler::new().with_max_pending(limit),
        None => ManualScheduler::new(),
    });
    let value = DebouncedValue::with_equality(
        String::new(),
        options.delay_ms,
        clock.clone(),
        options.equality,
    )?;

    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    {
        let trace = Arc::clone(&trace);
        let clock = Arc::clone(&clock);
        value.subscribe(move |settled: &String| {
            record(&trace, clock.now(), EventKind::Notify, Some(settled.clone()));
        });
    }

    let mut value = Some(value);
    for step in script.steps() {
        if options.until.is_some_and(|until| step.at > until) {
            debug!(at = ?step.at, "Step past the end of the run, not applied");
            break;
        }
        clock.advance_to(step.at);
        apply(&mut value, step, &trace);
    }

    match options.until {
        Some(until) => clock.advance_to(until),
        None => {
            clock.run_until_idle();
        }
    }

    let events = std::mem::take(&mut *trace.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(events)
}

fn apply(value: &mut Option<DebouncedValue<String, EqualityMode>>, step: &Step, trace: &Trace) {
    let Some(current) = value.as_ref() else {
        record(
            trace,
            step.at,
            EventKind::Error,
            Some("value already disposed".to_string()),
        );
        return;
    };

    let (kind, detail) = match &step.action {
        Action::Update(next) => match current.update(next.clone()) {
            Ok(UpdateOutcome::Scheduled) => (EventKind::Update, next.clone()),
            Ok(UpdateOutcome::Unchanged) => (EventKind::Skip, next.clone()),
            Err(e) => (EventKind::Error, e.to_string()),
        },
        Action::SetDelay(delay_ms) => match current.set_delay(*delay_ms) {
            Ok(()) => (EventKind::Delay, current.delay().to_string()),
            Err(e) => (EventKind::Error, e.to_string()),
        },
        Action::Dispose => {
            if let Some(disposed) = value.take() {
                disposed.dispose();
            }
            (EventKind::Dispose, String::new())
        }
    };

    let detail = if detail.is_empty() { None } else { Some(detail) };
    record(trace, step.at, kind, detail);
}
