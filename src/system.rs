//! Entry point for hosts.
//!
//! The `StatusSystem` holds the configuration shared by the scopes it
//! creates. Scopes themselves are fully independent.

use crate::config::ScopeConfig;
use crate::error::StatusError;
use crate::scope::StatusScope;
use crate::status::StatusInfo;
use std::marker::PhantomData;
use tracing::debug;

/// Factory for [`StatusScope`]s over one status description type.
///
/// # Examples
///
/// ```rust
/// use statusfx::{ScopeConfig, Status, StatusSystem};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Hp,
/// }
///
/// let system = StatusSystem::<Status<Kind>>::with_config(ScopeConfig {
///     pool_initial_capacity: 64,
///     ..ScopeConfig::default()
/// })
/// .unwrap();
///
/// let battle = system.create_scope();
/// let preview = system.create_scope();
/// assert!(!battle.is_disposed());
/// assert!(!preview.is_disposed());
/// ```
#[derive(Debug)]
pub struct StatusSystem<I> {
    config: ScopeConfig,
    _marker: PhantomData<fn() -> I>,
}

impl<I: StatusInfo> StatusSystem<I> {
    /// Create a system with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ScopeConfig::default(),
            _marker: PhantomData,
        }
    }

    /// Create a system with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`StatusError::InvalidConfig`] if the configuration fails
    /// [`ScopeConfig::validate`].
    pub fn with_config(config: ScopeConfig) -> Result<Self, StatusError> {
        config.validate()?;
        Ok(Self {
            config,
            _marker: PhantomData,
        })
    }

    /// Configuration handed to every new scope.
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Create a fresh, empty scope with its clock at zero.
    pub fn create_scope(&self) -> StatusScope<I> {
        debug!(
            pool_max_size = self.config.pool_max_size,
            include_pending_in_removals = self.config.include_pending_in_removals,
            "creating status scope"
        );
        StatusScope::new(self.config.clone())
    }
}

impl<I: StatusInfo> Default for StatusSystem<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::token::SubjectToken;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Hp,
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ScopeConfig {
            pool_max_size: 0,
            ..ScopeConfig::default()
        };
        let result = StatusSystem::<Status<Kind>>::with_config(config);
        assert!(matches!(result, Err(StatusError::InvalidConfig(_))));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let system = StatusSystem::<Status<Kind>>::new();
        let a = system.create_scope();
        let b = system.create_scope();
        let subject = SubjectToken::from(7);

        a.apply(subject, Status::new(Kind::Hp, 10.0)).unwrap();
        a.update(Duration::from_secs(1)).unwrap();
        b.update(Duration::from_secs(1)).unwrap();

        assert_eq!(a.get_status_value(subject, Kind::Hp).unwrap(), 10.0);
        assert_eq!(b.get_status_value(subject, Kind::Hp).unwrap(), 0.0);
    }

    #[test]
    fn test_new_scope_starts_at_zero() {
        let scope = StatusSystem::<Status<Kind>>::default().create_scope();
        assert_eq!(scope.current_time().unwrap(), Duration::ZERO);
    }
}
