//! Scope configuration.
//!
//! `ScopeConfig` tunes pooling and removal semantics. It is serde-friendly
//! so hosts can keep it next to the rest of their game settings; missing
//! fields take their defaults.

use crate::error::StatusError;
use crate::pool::{DEFAULT_CAPACITY, DEFAULT_MAX_SIZE};
use serde::{Deserialize, Serialize};

/// Configuration applied to every scope created by a `StatusSystem`.
///
/// # Examples
///
/// ```rust
/// use statusfx::ScopeConfig;
///
/// let config = ScopeConfig {
///     include_pending_in_removals: true,
///     ..ScopeConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Maximum number of released containers each pool keeps for reuse.
    pub pool_max_size: usize,

    /// Number of pool slots reserved when a scope is created.
    pub pool_initial_capacity: usize,

    /// Let removals target entities that are still pending.
    ///
    /// When `false` (the default) `remove_by_entity_token`, `remove_by_tag`
    /// and `clean_target` only see committed entities, so removing a status
    /// in the same tick it was applied does nothing. When `true` they also
    /// match pending entities, and the next tick cancels them before any
    /// observer sees them.
    pub include_pending_in_removals: bool,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            pool_max_size: DEFAULT_MAX_SIZE,
            pool_initial_capacity: DEFAULT_CAPACITY,
            include_pending_in_removals: false,
        }
    }
}

impl ScopeConfig {
    /// Check the configuration for values the engine cannot honor.
    ///
    /// # Errors
    ///
    /// [`StatusError::InvalidConfig`] if `pool_max_size` is zero.
    pub fn validate(&self) -> Result<(), StatusError> {
        if self.pool_max_size == 0 {
            return Err(StatusError::InvalidConfig(String::from(
                "pool_max_size must be greater than 0",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_max_size, 10_000);
        assert!(!config.include_pending_in_removals);
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let config = ScopeConfig {
            pool_max_size: 0,
            ..ScopeConfig::default()
        };
        assert!(matches!(config.validate(), Err(StatusError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: ScopeConfig =
            serde_json::from_str(r#"{"include_pending_in_removals": true}"#).unwrap();
        assert!(config.include_pending_in_removals);
        assert_eq!(config.pool_initial_capacity, 10);
    }
}
