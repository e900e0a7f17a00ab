//! # statusfx - Tick-Driven Status Effect Engine
//!
//! A status effect engine for games that provides:
//! - **Deferred** resolution (intents queue up, one tick commits them all)
//! - **Hardcode-free** design (no built-in status kinds like "HP" or "ATK")
//! - **Reactive** observation (value subscriptions, lifecycle effects, modifiers)
//! - **Isolated** scopes (battle, preview and menu never share state)
//!
//! ## Core Concepts
//!
//! ### Status Pipeline
//!
//! Statuses flow through a deferred pipeline:
//!
//! ```text
//! apply / remove → [pending queues] → update(time) → [alive entities] → aggregates → observers
//! ```
//!
//! 1. **Intents** (`apply`, `remove_by_entity_token`, `remove_by_tag`,
//!    `clean_target`) only enqueue work
//! 2. **Ticks** (`update`) expire, commit and cancel entities, then
//!    recompute the aggregate of every touched (subject, kind) key
//! 3. **Observers** run last, with no internal borrow held, so they may
//!    enqueue more intents for the next tick
//!
//! The aggregate of a key is the plain sum of the magnitudes of its alive
//! statuses, or `0.0` when none are alive.
//!
//! ## Example
//!
//! ```rust
//! use statusfx::*;
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Kind {
//!     Hp,
//!     Poison,
//! }
//!
//! let system = StatusSystem::<Status<Kind>>::new();
//! let scope = system.create_scope();
//! let player = SubjectToken::generate();
//!
//! // Intents are deferred
//! scope.apply(player, Status::new(Kind::Hp, 100.0)).unwrap();
//! scope
//!     .apply(
//!         player,
//!         Status::new(Kind::Poison, 3.0).with_duration(Duration::from_secs(5)),
//!     )
//!     .unwrap();
//! assert_eq!(scope.get_status_value(player, Kind::Hp).unwrap(), 0.0);
//!
//! // One tick commits them
//! scope.update(Duration::from_secs(1)).unwrap();
//! assert_eq!(scope.get_status_value(player, Kind::Hp).unwrap(), 100.0);
//! assert_eq!(scope.get_status_value(player, Kind::Poison).unwrap(), 3.0);
//!
//! // Timed statuses expire on the first tick at or past creation + duration
//! scope.update(Duration::from_secs(6)).unwrap();
//! assert_eq!(scope.get_status_value(player, Kind::Poison).unwrap(), 0.0);
//! ```
//!
//! ## Modules
//!
//! - [`token`] - Subject, tag and entity identifiers
//! - [`status`] - Status kinds and descriptions
//! - [`entity`] - Status keys and live entities
//! - [`value`] - Cached aggregates
//! - [`pool`] - Generational object pool
//! - [`store`] - Multi-index entity table
//! - [`scope`] - The resolution engine
//! - [`modifier`] - Derived values over several aggregates
//! - [`system`] - Scope factory
//! - [`config`] - Scope configuration
//! - [`handle`] - Subscription handles
//! - [`error`] - Error types

pub mod config;
mod effect;
pub mod entity;
pub mod error;
pub mod handle;
pub mod modifier;
pub mod pool;
pub mod scope;
pub mod status;
pub mod store;
mod subscription;
pub mod system;
pub mod token;
pub mod value;

// Re-export main types for convenience
pub use config::ScopeConfig;
pub use entity::{StatusEntity, StatusKey};
pub use error::StatusError;
pub use handle::SubscriptionHandle;
pub use scope::{StatusScope, WeakStatusScope};
pub use system::StatusSystem;
pub use value::StatusValue;

// Re-export status descriptions and identifiers
pub use status::{Status, StatusInfo, StatusKind};
pub use token::{generate_unique_id, EntityToken, SubjectToken, Tag};

// Re-export modifiers
pub use modifier::{Modifier, Modifier1, Modifier2, Modifier3, Modifier4};

// Re-export pooling primitives
pub use pool::{ObjectPool, PoolKey};
