//! Error types for status resolution.
//!
//! All errors the engine can report are represented by the `StatusError`
//! enum. Operating on entity tokens that are unknown to a scope is never an
//! error: callers routinely hold tokens past natural expiration.

use thiserror::Error;

/// Errors that can occur while driving a status scope.
///
/// # Examples
///
/// ```rust
/// use statusfx::StatusError;
///
/// let err = StatusError::Disposed;
/// println!("{}", err); // "Status scope has been disposed"
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The scope was disposed.
    ///
    /// Every operation on a disposed scope fails with this error. It is not
    /// recoverable: create a new scope instead.
    #[error("Status scope has been disposed")]
    Disposed,

    /// A pooled object was released twice.
    ///
    /// Raised when a `PoolKey` is released while its slot is already free,
    /// or when the key's generation no longer matches the slot.
    #[error("Pool slot {index} (generation {generation}) was already released")]
    DoubleRelease { index: u32, generation: u32 },

    /// A tick was started from inside a callback of the same scope.
    #[error("Scope update re-entered from within its own resolution pass")]
    ReentrantUpdate,

    /// A configuration value was rejected.
    #[error("Invalid scope configuration: {0}")]
    InvalidConfig(String),
}
