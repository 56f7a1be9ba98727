//! The quiet-window length of a debounced value.

use std::fmt;
use std::time::Duration;

use crate::error::Error;

/// A validated, non-negative quiet window.
///
/// `Duration` cannot be negative, so conversions from it are infallible.
/// Signed millisecond counts (as found in configuration files and on the
/// command line) go through [`TryFrom<i64>`] and reject negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Delay(Duration);

impl Delay {
    /// A zero-length quiet window.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Create a delay from whole milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// The delay as a `Duration`.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        self.0
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl From<Delay> for Duration {
    fn from(delay: Delay) -> Self {
        delay.0
    }
}

impl TryFrom<i64> for Delay {
    type Error = Error;

    fn try_from(millis: i64) -> Result<Self, Self::Error> {
        u64::try_from(millis).map(Self::from_millis).map_err(|_| {
            Error::invalid_argument(format!("delay must be non-negative, got {millis}ms"))
        })
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_millis() {
        assert_eq!(
            Delay::from_millis(300).as_duration(),
            Duration::from_millis(300)
        );
    }

    #[test]
    fn test_try_from_negative() {
        let err = Delay::try_from(-1_i64).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("-1ms"));
    }

    #[test]
    fn test_try_from_zero_and_positive() {
        assert_eq!(Delay::try_from(0_i64).unwrap(), Delay::ZERO);
        assert_eq!(Delay::try_from(300_i64).unwrap(), Delay::from_millis(300));
    }

    #[test]
    fn test_display() {
        assert_eq!(Delay::from_millis(300).to_string(), "300ms");
    }

    #[test]
    fn test_duration_conversions() {
        let delay: Delay = Duration::from_secs(1).into();
        let back: Duration = delay.into();
        assert_eq!(back, Duration::from_secs(1));
    }
}
