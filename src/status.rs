//! Status description module.
//!
//! The engine does not know any concrete status kinds ("HP", "ATK") or the
//! payload shape hosts attach to them. Instead it is generic over a
//! [`StatusInfo`] value exposing kind, optional duration, magnitude and tag.
//! [`Status`] is a ready-made implementation for hosts that need nothing
//! more.

use crate::token::Tag;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

/// Host-defined category of a status effect.
///
/// Blanket-implemented for any small value type with equality and hashing,
/// which is what a plain fieldless `enum` provides.
///
/// # Examples
///
/// ```rust
/// use statusfx::StatusKind;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Hp,
///     Atk,
/// }
///
/// fn assert_kind<K: StatusKind>() {}
/// assert_kind::<Kind>();
/// ```
pub trait StatusKind: Copy + Eq + Hash + Debug + 'static {}

impl<T> StatusKind for T where T: Copy + Eq + Hash + Debug + 'static {}

/// Immutable description of one status instance.
///
/// Implementations must be deterministic: every accessor returns the same
/// value for the lifetime of the instance.
///
/// # Examples
///
/// ```rust
/// use statusfx::{StatusInfo, Tag};
/// use std::time::Duration;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Poison,
/// }
///
/// struct PoisonCloud {
///     dps: f32,
/// }
///
/// impl StatusInfo for PoisonCloud {
///     type Kind = Kind;
///
///     fn kind(&self) -> Kind {
///         Kind::Poison
///     }
///
///     fn duration(&self) -> Option<Duration> {
///         Some(Duration::from_secs(5))
///     }
///
///     fn magnitude(&self) -> f32 {
///         -self.dps
///     }
///
///     fn tag(&self) -> Tag {
///         Tag::NONE
///     }
/// }
/// ```
pub trait StatusInfo: 'static {
    /// The kind enumeration this info belongs to.
    type Kind: StatusKind;

    /// Which aggregate this status contributes to.
    fn kind(&self) -> Self::Kind;

    /// How long the status stays alive after it was applied.
    ///
    /// `None` means the status lives until it is removed explicitly.
    fn duration(&self) -> Option<Duration>;

    /// Signed contribution to the aggregate.
    fn magnitude(&self) -> f32;

    /// Group used by `remove_by_tag`.
    fn tag(&self) -> Tag;
}

/// A plain status value implementing [`StatusInfo`].
///
/// # Examples
///
/// ```rust
/// use statusfx::{Status, StatusInfo, Tag};
/// use std::time::Duration;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Atk,
/// }
///
/// let rage = Tag::generate();
/// let buff = Status::new(Kind::Atk, 15.0)
///     .with_duration(Duration::from_secs(10))
///     .with_tag(rage);
///
/// assert_eq!(buff.kind(), Kind::Atk);
/// assert_eq!(buff.magnitude(), 15.0);
/// assert_eq!(buff.duration(), Some(Duration::from_secs(10)));
/// assert_eq!(buff.tag(), rage);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Status<K> {
    /// The status kind.
    pub kind: K,
    /// Optional lifetime.
    pub duration: Option<Duration>,
    /// Signed contribution.
    pub magnitude: f32,
    /// Removal group.
    pub tag: Tag,
}

impl<K> Status<K> {
    /// Create a permanent, untagged status.
    pub fn new(kind: K, magnitude: f32) -> Self {
        Self {
            kind,
            duration: None,
            magnitude,
            tag: Tag::NONE,
        }
    }

    /// Expire the status `duration` after it was applied.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Put the status into a removal group.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag = tag;
        self
    }
}

impl<K: StatusKind> StatusInfo for Status<K> {
    type Kind = K;

    fn kind(&self) -> K {
        self.kind
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn magnitude(&self) -> f32 {
        self.magnitude
    }

    fn tag(&self) -> Tag {
        self.tag
    }
}
