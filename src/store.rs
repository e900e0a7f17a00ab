//! Entity store module.
//!
//! Provides `EntityStore`, the table of live status entities. It keeps
//! three indices consistent with each other:
//!
//! - by entity token (authoritative)
//! - by subject token
//! - by (subject, kind) key
//!
//! The per-subject and per-key index sets are checked out of an
//! [`ObjectPool`] on first use and returned when they empty out. No
//! aggregation happens here.

use crate::entity::{StatusEntity, StatusKey};
use crate::error::StatusError;
use crate::pool::{ObjectPool, PoolKey};
use crate::status::StatusInfo;
use crate::token::{EntityToken, SubjectToken};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

type TokenSet = HashSet<EntityToken>;

/// Multi-index table of live status entities.
pub struct EntityStore<I: StatusInfo> {
    by_token: HashMap<EntityToken, StatusEntity<I>>,
    by_subject: HashMap<SubjectToken, PoolKey>,
    by_key: HashMap<StatusKey<I::Kind>, PoolKey>,
    sets: ObjectPool<TokenSet>,
}

impl<I: StatusInfo> EntityStore<I> {
    /// Create an empty store backed by `sets`.
    pub fn new(sets: ObjectPool<TokenSet>) -> Self {
        Self {
            by_token: HashMap::new(),
            by_subject: HashMap::new(),
            by_key: HashMap::new(),
            sets,
        }
    }

    /// Create an empty store with a default set pool.
    pub fn with_default_pool() -> Self {
        Self::new(ObjectPool::new(TokenSet::new).with_on_release(|set| set.clear()))
    }

    /// Insert an entity into all three indices.
    ///
    /// Inserting a token that is already present replaces nothing and
    /// returns `false`.
    pub fn add(&mut self, entity: StatusEntity<I>) -> bool {
        if self.by_token.contains_key(&entity.token) {
            return false;
        }

        let token = entity.token;
        let subject = entity.subject;
        let key = entity.key();
        self.by_token.insert(token, entity);

        insert_indexed(&mut self.by_subject, &mut self.sets, subject, token);
        insert_indexed(&mut self.by_key, &mut self.sets, key, token);
        true
    }

    /// Remove an entity from all three indices.
    ///
    /// Index sets that become empty go back to the pool. Returns the removed
    /// entity, or `None` if the token was not present.
    ///
    /// # Errors
    ///
    /// Propagates [`StatusError::DoubleRelease`] from the pool, which means
    /// the indices were corrupted.
    pub fn remove(&mut self, token: EntityToken) -> Result<Option<StatusEntity<I>>, StatusError> {
        let Some(entity) = self.by_token.remove(&token) else {
            return Ok(None);
        };

        remove_indexed(&mut self.by_subject, &mut self.sets, entity.subject, token)?;
        remove_indexed(&mut self.by_key, &mut self.sets, entity.key(), token)?;
        Ok(Some(entity))
    }

    /// Whether the token denotes a live entity.
    pub fn contains(&self, token: EntityToken) -> bool {
        self.by_token.contains_key(&token)
    }

    /// Look up a live entity.
    pub fn get(&self, token: EntityToken) -> Option<&StatusEntity<I>> {
        self.by_token.get(&token)
    }

    /// Tokens of every live entity at `subject`.
    pub fn by_subject(&self, subject: SubjectToken) -> Option<&TokenSet> {
        let key = self.by_subject.get(&subject)?;
        self.sets.get_ref(*key)
    }

    /// Tokens of every live entity under `key`.
    pub fn by_key(&self, key: &StatusKey<I::Kind>) -> Option<&TokenSet> {
        let pool_key = self.by_key.get(key)?;
        self.sets.get_ref(*pool_key)
    }

    /// Every live entity at `subject`.
    pub fn entities_for_subject(
        &self,
        subject: SubjectToken,
    ) -> impl Iterator<Item = &StatusEntity<I>> + '_ {
        self.by_subject(subject)
            .into_iter()
            .flatten()
            .filter_map(move |token| self.by_token.get(token))
    }

    /// Every live entity under `key`.
    pub fn entities_for_key<'a>(
        &'a self,
        key: &StatusKey<I::Kind>,
    ) -> impl Iterator<Item = &'a StatusEntity<I>> + 'a {
        self.by_key(key)
            .into_iter()
            .flatten()
            .filter_map(move |token| self.by_token.get(token))
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Whether the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Drop every entity and every pooled index set.
    pub fn clear(&mut self) {
        self.by_token.clear();
        self.by_subject.clear();
        self.by_key.clear();
        self.sets.clear();
    }
}

fn insert_indexed<K: Hash + Eq>(
    index: &mut HashMap<K, PoolKey>,
    sets: &mut ObjectPool<TokenSet>,
    key: K,
    token: EntityToken,
) {
    let pool_key = *index.entry(key).or_insert_with(|| sets.get());
    if let Some(set) = sets.get_mut(pool_key) {
        set.insert(token);
    }
}

fn remove_indexed<K: Hash + Eq>(
    index: &mut HashMap<K, PoolKey>,
    sets: &mut ObjectPool<TokenSet>,
    key: K,
    token: EntityToken,
) -> Result<(), StatusError> {
    let Some(&pool_key) = index.get(&key) else {
        return Ok(());
    };

    let emptied = match sets.get_mut(pool_key) {
        Some(set) => {
            set.remove(&token);
            set.is_empty()
        }
        None => true,
    };

    if emptied {
        index.remove(&key);
        sets.release(pool_key)?;
    }
    Ok(())
}
