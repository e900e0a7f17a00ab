//! Token module.
//!
//! Provides the process-wide `TokenAllocator` and the opaque integer
//! identifiers built on it: `SubjectToken`, `Tag`, `EntityToken` and the
//! internal subscriber ids. The value `0` is reserved to mean "none" for
//! every token type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing id source.
///
/// Every call to [`next`](TokenAllocator::next) returns a value strictly
/// greater than every value previously returned by the same allocator.
/// The counter is atomic, so tokens can be requested from any thread even
/// though scopes themselves are single-threaded.
///
/// # Examples
///
/// ```rust
/// use statusfx::token::TokenAllocator;
///
/// let allocator = TokenAllocator::new();
/// let a = allocator.next();
/// let b = allocator.next();
/// assert!(a > 0);
/// assert!(b > a);
/// ```
#[derive(Debug)]
pub struct TokenAllocator {
    last: AtomicU64,
}

impl TokenAllocator {
    /// Create an allocator whose first id is `1`.
    pub const fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Return the next id. Never returns `0`.
    pub fn next(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_ALLOCATOR: TokenAllocator = TokenAllocator::new();

/// Draw an id from the process-wide allocator.
///
/// All token types share this counter, so ids are unique across kinds.
pub fn generate_unique_id() -> u64 {
    GLOBAL_ALLOCATOR.next()
}

fn fmt_token(f: &mut fmt::Formatter<'_>, name: &str, value: u64) -> fmt::Result {
    match value {
        0 => write!(f, "{}(None)", name),
        v => write!(f, "{}({:08X})", name, v),
    }
}

/// Identifies "who" a status applies to.
///
/// Subjects carry no payload. Hosts either mint them with
/// [`generate`](SubjectToken::generate) or convert their own ids.
///
/// # Examples
///
/// ```rust
/// use statusfx::SubjectToken;
///
/// let player = SubjectToken::from(42);
/// assert_eq!(player.value(), 42);
/// assert_eq!(player.to_string(), "SubjectToken(0000002A)");
/// assert!(SubjectToken::NONE.is_none());
/// ```
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectToken(u64);

impl SubjectToken {
    /// The "no subject" token.
    pub const NONE: SubjectToken = SubjectToken(0);

    /// Wrap a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Mint a fresh, process-unique subject token.
    pub fn generate() -> Self {
        Self(generate_unique_id())
    }

    /// The raw value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is [`SubjectToken::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for SubjectToken {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<SubjectToken> for u64 {
    fn from(token: SubjectToken) -> Self {
        token.0
    }
}

impl fmt::Display for SubjectToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_token(f, "SubjectToken", self.0)
    }
}

/// Groups statuses for bulk removal with `remove_by_tag`.
///
/// # Examples
///
/// ```rust
/// use statusfx::Tag;
///
/// let poison = Tag::generate();
/// assert!(!poison.is_none());
/// assert_eq!(Tag::NONE.to_string(), "Tag(None)");
/// ```
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(u64);

impl Tag {
    /// The "untagged" tag.
    pub const NONE: Tag = Tag(0);

    /// Wrap a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Mint a fresh, process-unique tag.
    pub fn generate() -> Self {
        Self(generate_unique_id())
    }

    /// The raw value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is [`Tag::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Tag {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Tag> for u64 {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_token(f, "Tag", self.0)
    }
}

/// Uniquely identifies one applied status instance.
///
/// Entity tokens are only minted by a scope's `apply` and are never reused.
#[derive(Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityToken(u64);

impl EntityToken {
    /// The "no entity" token. Never denotes a live or pending entity.
    pub const NONE: EntityToken = EntityToken(0);

    pub(crate) fn generate() -> Self {
        Self(generate_unique_id())
    }

    /// The raw value.
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this is [`EntityToken::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EntityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_token(f, "EntityToken", self.0)
    }
}

/// Key of one value-change subscriber inside a subscription.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn generate() -> Self {
        Self(generate_unique_id())
    }
}

/// Key of one lifecycle effect bound to an entity.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct EffectId(u64);

impl EffectId {
    pub(crate) fn generate() -> Self {
        Self(generate_unique_id())
    }
}
