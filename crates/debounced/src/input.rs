//! Line-oriented input consumer.
//!
//! Treats every line read from an async reader as a new raw value (the way a
//! search box treats keystrokes) and emits a [`Settled`] record whenever the
//! debounced value catches up.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::InputConfig;
use crate::debounce::DebouncedValue;
use crate::delay::Delay;
use crate::equality::EqualityMode;
use crate::error::Result;
use crate::scheduler::Scheduler;

/// A value that stayed unchanged for the whole quiet window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settled {
    /// The settled value.
    pub value: String,
    /// Number of notifications delivered so far, this one included.
    pub sequence: u64,
    /// Wall-clock time the value was picked up.
    pub settled_at: DateTime<Utc>,
}

/// Options for [`debounce_lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineOptions {
    /// Quiet window.
    pub delay: Delay,
    /// How repeated lines are detected.
    pub equality: EqualityMode,
    /// Strip surrounding whitespace.
    pub trim: bool,
    /// Ignore empty lines.
    pub skip_empty: bool,
}

impl LineOptions {
    /// Build options from the `[input]` configuration section.
    #[must_use]
    pub fn from_config(delay: Delay, equality: EqualityMode, input: &InputConfig) -> Self {
        Self {
            delay,
            equality,
            trim: input.trim,
            skip_empty: input.skip_empty,
        }
    }

    fn normalize(&self, line: String) -> Option<String> {
        let line = if self.trim {
            line.trim().to_string()
        } else {
            line
        };
        if self.skip_empty && line.is_empty() {
            None
        } else {
            Some(line)
        }
    }
}

/// Counters reported once the input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineSummary {
    /// Lines read.
    pub lines: u64,
    /// Lines ignored because they were empty.
    pub skipped: u64,
    /// Settled values emitted.
    pub settled: u64,
}

/// Debounce lines from `reader`, handing each settled value to `sink`.
///
/// At end of input any pending value is allowed to settle before the
/// debounced value is disposed. Only the latest settled value is reported
/// if several settle before the sink gets to run.
///
/// # Errors
///
/// Returns an error if reading fails, a timer cannot be armed, or `sink`
/// returns an error.
pub async fn debounce_lines<R, F>(
    reader: R,
    options: LineOptions,
    scheduler: Arc<dyn Scheduler>,
    mut sink: F,
) -> Result<LineSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&Settled) -> Result<()>,
{
    let value = DebouncedValue::with_equality(
        String::new(),
        options.delay,
        scheduler,
        options.equality,
    )?;
    let mut rx = value.watch();

    let mut summary = LineSummary::default();
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                emit(&value, &mut rx, &mut summary, &mut sink)?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!(lines = summary.lines, "End of input");
                    break;
                };
                summary.lines += 1;
                match options.normalize(line) {
                    Some(line) => {
                        trace!(len = line.len(), "Input line");
                        value.update(line)?;
                    }
                    None => summary.skipped += 1,
                }
            }
        }
    }

    // Read `pending` first. A fire clears it and publishes to the watch
    // channel under one lock, so a timer firing between the two reads still
    // shows up in `has_changed`.
    loop {
        let pending = value.is_pending();
        let fresh = rx.has_changed().unwrap_or(false);
        if !fresh {
            if !pending || rx.changed().await.is_err() {
                break;
            }
        }
        emit(&value, &mut rx, &mut summary, &mut sink)?;
    }

    value.dispose();
    Ok(summary)
}

fn emit<F>(
    value: &DebouncedValue<String, EqualityMode>,
    rx: &mut watch::Receiver<String>,
    summary: &mut LineSummary,
    sink: &mut F,
) -> Result<()>
where
    F: FnMut(&Settled) -> Result<()>,
{
    let settled = Settled {
        value: rx.borrow_and_update().clone(),
        sequence: value.notification_count(),
        settled_at: Utc::now(),
    };
    summary.settled += 1;
    sink(&settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TokioScheduler;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn options() -> LineOptions {
        LineOptions {
            delay: Delay::from_millis(300),
            equality: EqualityMode::Value,
            trim: true,
            skip_empty: false,
        }
    }

    async fn run(input: &'static [u8], options: LineOptions) -> (Vec<String>, LineSummary) {
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let mut out = Vec::new();
        let summary = debounce_lines(input, options, scheduler, |s| {
            out.push(s.value.clone());
            Ok(())
        })
        .await
        .unwrap();
        (out, summary)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_settles_once() {
        let (out, summary) = run(b"a\nab\nabc\n", options()).await;
        assert_eq!(out, vec!["abc"]);
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.settled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trim_and_skip_empty() {
        let opts = LineOptions {
            skip_empty: true,
            ..options()
        };
        let (out, summary) = run(b"  query  \n\n   \n", opts).await;
        assert_eq!(out, vec!["query"]);
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_settles_nothing() {
        let (out, summary) = run(b"", options()).await;
        assert!(out.is_empty());
        assert_eq!(summary, LineSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_gaps_settle_each_value() {
        let (reader, mut writer) = tokio::io::duplex(64);
        tokio::spawn(async move {
            writer.write_all(b"first\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            writer.write_all(b"second\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            writer.write_all(b"third\n").await.unwrap();
        });

        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let mut out = Vec::new();
        debounce_lines(BufReader::new(reader), options(), scheduler, |s| {
            out.push((s.value.clone(), s.sequence));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            out,
            vec![("first".to_string(), 1), ("third".to_string(), 2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_with_single_timer_slot() {
        let scheduler = Arc::new(TokioScheduler::current().unwrap().with_max_pending(1));
        let mut out = Vec::new();
        let summary = debounce_lines(&b"a\nab\nabc\n"[..], options(), scheduler, |s| {
            out.push(s.value.clone());
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(out, vec!["abc"]);
        assert_eq!(summary.settled, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_final_value_settles_on_worker_threads() {
        let opts = LineOptions {
            delay: Delay::from_millis(1),
            ..options()
        };
        for _ in 0..200 {
            let scheduler = Arc::new(TokioScheduler::current().unwrap());
            let mut out = Vec::new();
            debounce_lines(&b"x\n"[..], opts, scheduler, |s| {
                out.push(s.value.clone());
                Ok(())
            })
            .await
            .unwrap();
            assert_eq!(out, vec!["x"]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_error_propagates() {
        let scheduler = Arc::new(TokioScheduler::current().unwrap());
        let result = debounce_lines(&b"x\n"[..], options(), scheduler, |_| {
            Err(crate::error::Error::internal("sink closed"))
        })
        .await;
        assert!(result.is_err());
    }
}
