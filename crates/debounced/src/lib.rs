//! `debounced` - A value that settles only after its source goes quiet
//!
//! This library provides a debounced value primitive: rapid updates to a
//! source are coalesced so consumers only see the last value of a burst,
//! once no further update arrived for the configured delay. Timers come from
//! a pluggable [`Scheduler`], with a tokio-backed implementation for real
//! time and a manual one for deterministic replay.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod debounce;
pub mod delay;
pub mod equality;
pub mod error;
pub mod input;
pub mod logging;
pub mod scheduler;
pub mod simulate;

pub use config::Config;
pub use debounce::{DebouncedValue, Listener, SubscriptionId, UpdateOutcome};
pub use delay::Delay;
pub use equality::{AlwaysDistinct, EqualityMode, EqualityPolicy, PointerEq, ValueEq};
pub use error::{Error, ErrorKind, Result};
pub use logging::init_logging;
pub use scheduler::{ManualScheduler, Scheduler, SchedulerError, TimerToken, TokioScheduler};
