//! Aggregate value module.
//!
//! Contains the `StatusValue` type, the cached total of all live statuses
//! sharing one (subject, kind) key.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cached aggregate for one (subject, kind) key.
///
/// This is read-only, copyable and network-safe. It exists only while at
/// least one live status shares the key; an absent value reads as `0.0`.
///
/// # Examples
///
/// ```rust
/// use statusfx::StatusValue;
/// use std::time::Duration;
///
/// let value = StatusValue::new(70.0, Duration::from_secs(2));
/// assert_eq!(value.total, 70.0);
/// assert_eq!(value.updated_at, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusValue {
    /// Sum of the magnitudes of every live status under the key.
    pub total: f32,

    /// Scope time of the tick that last recomputed `total`.
    pub updated_at: Duration,
}

impl StatusValue {
    /// Create a value.
    pub fn new(total: f32, updated_at: Duration) -> Self {
        Self { total, updated_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero() {
        let value = StatusValue::default();
        assert_eq!(value.total, 0.0);
        assert_eq!(value.updated_at, Duration::ZERO);
    }

    #[test]
    fn test_value_serializes() {
        let value = StatusValue::new(12.5, Duration::from_secs(3));
        let json = serde_json::to_value(value).unwrap();
        assert_eq!(json["total"], 12.5);
        let back: StatusValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, value);
    }
}
