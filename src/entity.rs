//! Status entity module.
//!
//! A `StatusEntity` is one applied status instance: the host's info plus
//! the engine's bookkeeping (token, subject, creation time). `StatusKey`
//! is the (subject, kind) pair statuses are aggregated and observed by.

use crate::status::{StatusInfo, StatusKind};
use crate::token::{EntityToken, SubjectToken};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The unit of aggregation and subscription.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusKey<K> {
    /// Who the statuses apply to.
    pub subject: SubjectToken,
    /// Which kind of status.
    pub kind: K,
}

impl<K: StatusKind> StatusKey<K> {
    /// Create a key.
    pub fn new(subject: SubjectToken, kind: K) -> Self {
        Self { subject, kind }
    }
}

impl<K: StatusKind> fmt::Display for StatusKey<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusKey({}, {:?})", self.subject, self.kind)
    }
}

/// One applied status instance.
#[derive(Debug, Clone)]
pub struct StatusEntity<I> {
    /// Unique handle of this instance.
    pub token: EntityToken,
    /// Scope time at which `apply` was called.
    pub created_at: Duration,
    /// The host-supplied description.
    pub info: I,
    /// Who the status applies to.
    pub subject: SubjectToken,
}

impl<I: StatusInfo> StatusEntity<I> {
    pub(crate) fn new(created_at: Duration, info: I, subject: SubjectToken) -> Self {
        Self {
            token: EntityToken::generate(),
            created_at,
            info,
            subject,
        }
    }

    /// The key this entity is aggregated under.
    pub fn key(&self) -> StatusKey<I::Kind> {
        StatusKey::new(self.subject, self.info.kind())
    }

    /// Whether the entity's lifetime has elapsed at `now`.
    ///
    /// An entity with duration `d` created at `t` is alive on `[t, t + d)`.
    /// Entities without a duration never expire.
    pub fn is_expired(&self, now: Duration) -> bool {
        match self.info.duration() {
            Some(duration) => self.created_at.saturating_add(duration) <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Hp,
    }

    #[test]
    fn test_entity_key() {
        let subject = SubjectToken::from(42);
        let entity = StatusEntity::new(Duration::ZERO, Status::new(Kind::Hp, 1.0), subject);
        assert_eq!(entity.key(), StatusKey::new(subject, Kind::Hp));
        assert!(!entity.token.is_none());
    }

    #[test]
    fn test_expiration_is_half_open() {
        let info = Status::new(Kind::Hp, 1.0).with_duration(Duration::from_secs(2));
        let entity = StatusEntity::new(Duration::from_secs(1), info, SubjectToken::from(1));

        assert!(!entity.is_expired(Duration::from_secs(1)));
        assert!(!entity.is_expired(Duration::from_millis(2999)));
        assert!(entity.is_expired(Duration::from_secs(3)));
        assert!(entity.is_expired(Duration::from_secs(10)));
    }

    #[test]
    fn test_permanent_entity_never_expires() {
        let entity = StatusEntity::new(
            Duration::ZERO,
            Status::new(Kind::Hp, 1.0),
            SubjectToken::from(1),
        );
        assert!(!entity.is_expired(Duration::MAX));
    }

    #[test]
    fn test_key_display() {
        let key = StatusKey::new(SubjectToken::from(16), Kind::Hp);
        assert_eq!(key.to_string(), "StatusKey(SubjectToken(00000010), Hp)");
    }
}
