//! Equality policies deciding whether an update is a repeat of the current
//! source value.
//!
//! An update judged equal is skipped: no timer is armed or replaced.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Decides whether a new source value repeats the current one.
pub trait EqualityPolicy<T>: Send + Sync {
    /// Returns `true` if `next` should be treated as the same value as `current`.
    fn same(&self, current: &T, next: &T) -> bool;
}

/// Structural equality via `PartialEq`. This is the default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueEq;

impl<T: PartialEq> EqualityPolicy<T> for ValueEq {
    fn same(&self, current: &T, next: &T) -> bool {
        current == next
    }
}

/// Identity of shared values: two `Arc`s are the same only if they point at
/// the same allocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerEq;

impl<U: ?Sized> EqualityPolicy<Arc<U>> for PointerEq {
    fn same(&self, current: &Arc<U>, next: &Arc<U>) -> bool {
        Arc::ptr_eq(current, next)
    }
}

/// Every update is distinct and re-arms the timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysDistinct;

impl<T> EqualityPolicy<T> for AlwaysDistinct {
    fn same(&self, _current: &T, _next: &T) -> bool {
        false
    }
}

/// Runtime-selectable policy, used where the choice comes from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityMode {
    /// Skip updates that compare equal.
    #[default]
    Value,
    /// Never skip updates.
    AlwaysDistinct,
}

impl<T: PartialEq> EqualityPolicy<T> for EqualityMode {
    fn same(&self, current: &T, next: &T) -> bool {
        match self {
            Self::Value => ValueEq.same(current, next),
            Self::AlwaysDistinct => false,
        }
    }
}

impl std::fmt::Display for EqualityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => write!(f, "value"),
            Self::AlwaysDistinct => write!(f, "always_distinct"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_eq() {
        assert!(ValueEq.same(&"abc", &"abc"));
        assert!(!ValueEq.same(&1, &2));
    }

    #[test]
    fn test_pointer_eq() {
        let a = Arc::new(String::from("same"));
        let b = Arc::new(String::from("same"));
        assert!(PointerEq.same(&a, &Arc::clone(&a)));
        assert!(!PointerEq.same(&a, &b));
    }

    #[test]
    fn test_always_distinct() {
        assert!(!AlwaysDistinct.same(&1, &1));
    }

    #[test]
    fn test_equality_mode() {
        assert!(EqualityMode::Value.same(&"y", &"y"));
        assert!(!EqualityMode::AlwaysDistinct.same(&"y", &"y"));
        assert_eq!(EqualityMode::default(), EqualityMode::Value);
    }

    #[test]
    fn test_equality_mode_serde() {
        let json = serde_json::to_string(&EqualityMode::AlwaysDistinct).unwrap();
        assert_eq!(json, "\"always_distinct\"");
        let mode: EqualityMode = serde_json::from_str("\"value\"").unwrap();
        assert_eq!(mode, EqualityMode::Value);
    }
}
