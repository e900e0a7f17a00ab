//! Subscription registry module.
//!
//! Each (subject, kind) key with observers owns a pooled map from
//! subscriber id to callback. Callbacks are reference counted so the scope
//! can snapshot them and invoke them without holding any internal borrow;
//! that is what lets a callback call back into its own scope.

use crate::entity::StatusKey;
use crate::error::StatusError;
use crate::pool::{ObjectPool, PoolKey};
use crate::status::StatusKind;
use crate::token::SubscriberId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::trace;

/// Shared value-change callback.
pub(crate) type ValueCallback = Rc<RefCell<dyn FnMut(f32)>>;

type SubscriberMap = HashMap<SubscriberId, ValueCallback>;

/// Registry of value-change observers, one pooled map per key.
pub(crate) struct SubscriptionRegistry<K> {
    subscriptions: HashMap<StatusKey<K>, PoolKey>,
    maps: ObjectPool<SubscriberMap>,
    /// Keys whose last subscriber left since the previous eviction pass.
    emptied: HashSet<StatusKey<K>>,
}

impl<K: StatusKind> SubscriptionRegistry<K> {
    pub(crate) fn new(maps: ObjectPool<SubscriberMap>) -> Self {
        Self {
            subscriptions: HashMap::new(),
            maps,
            emptied: HashSet::new(),
        }
    }

    pub(crate) fn add(&mut self, key: StatusKey<K>, id: SubscriberId, callback: ValueCallback) {
        let maps = &mut self.maps;
        let pool_key = *self.subscriptions.entry(key).or_insert_with(|| maps.get());
        if let Some(map) = self.maps.get_mut(pool_key) {
            map.insert(id, callback);
        }
        self.emptied.remove(&key);
    }

    /// Remove one subscriber. The emptied map stays until the next
    /// [`evict_emptied`](Self::evict_emptied).
    ///
    /// Returns the removed callback so the caller can drop it outside any
    /// borrow of the registry.
    pub(crate) fn remove(&mut self, key: &StatusKey<K>, id: SubscriberId) -> Option<ValueCallback> {
        let pool_key = *self.subscriptions.get(key)?;
        let map = self.maps.get_mut(pool_key)?;
        let removed = map.remove(&id);
        if map.is_empty() {
            self.emptied.insert(*key);
        }
        removed
    }

    pub(crate) fn contains(&self, key: &StatusKey<K>, id: SubscriberId) -> bool {
        self.map(key).is_some_and(|map| map.contains_key(&id))
    }

    pub(crate) fn has_subscription(&self, key: &StatusKey<K>) -> bool {
        self.subscriptions.contains_key(key)
    }

    pub(crate) fn is_empty(&self, key: &StatusKey<K>) -> bool {
        self.map(key).map_or(true, |map| map.is_empty())
    }

    /// Number of subscribers registered for `key`.
    pub(crate) fn subscriber_count(&self, key: &StatusKey<K>) -> usize {
        self.map(key).map_or(0, |map| map.len())
    }

    /// Copy every callback registered for `key` into `out`.
    pub(crate) fn snapshot(&self, key: &StatusKey<K>, out: &mut Vec<(SubscriberId, ValueCallback)>) {
        if let Some(map) = self.map(key) {
            out.extend(map.iter().map(|(id, cb)| (*id, Rc::clone(cb))));
        }
    }

    /// Drop the subscription for `key` if it has no subscribers left.
    pub(crate) fn evict_if_empty(&mut self, key: &StatusKey<K>) -> Result<bool, StatusError> {
        if !self.is_empty(key) {
            return Ok(false);
        }
        self.emptied.remove(key);
        match self.subscriptions.remove(key) {
            Some(pool_key) => {
                self.maps.release(pool_key)?;
                trace!(%key, "evicted empty subscription");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Evict every subscription emptied since the previous pass.
    pub(crate) fn evict_emptied(&mut self) -> Result<(), StatusError> {
        let mut emptied = std::mem::take(&mut self.emptied);
        let result = emptied
            .iter()
            .try_for_each(|key| self.evict_if_empty(key).map(|_| ()));
        emptied.clear();
        self.emptied = emptied;
        result
    }

    /// Number of keys holding a subscription, empty or not.
    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn clear(&mut self) {
        self.subscriptions.clear();
        self.emptied.clear();
        self.maps.clear();
    }

    fn map(&self, key: &StatusKey<K>) -> Option<&SubscriberMap> {
        let pool_key = self.subscriptions.get(key)?;
        self.maps.get_ref(*pool_key)
    }
}

pub(crate) fn subscriber_map_pool(max_size: usize, capacity: usize) -> ObjectPool<SubscriberMap> {
    ObjectPool::new(SubscriberMap::new)
        .with_on_release(|map| map.clear())
        .with_max_size(max_size)
        .with_capacity(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::SubjectToken;
    use std::cell::Cell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Hp,
    }

    fn key() -> StatusKey<Kind> {
        StatusKey::new(SubjectToken::from(1), Kind::Hp)
    }

    fn counter() -> (Rc<Cell<f32>>, ValueCallback) {
        let seen = Rc::new(Cell::new(0.0));
        let s = Rc::clone(&seen);
        let callback: ValueCallback = Rc::new(RefCell::new(move |v: f32| s.set(v)));
        (seen, callback)
    }

    #[test]
    fn test_add_and_snapshot() {
        let mut registry = SubscriptionRegistry::new(subscriber_map_pool(10, 1));
        let (seen, callback) = counter();
        let id = SubscriberId::generate();
        registry.add(key(), id, callback);

        let mut out = Vec::new();
        registry.snapshot(&key(), &mut out);
        assert_eq!(out.len(), 1);
        (&mut *out[0].1.borrow_mut())(42.0);
        assert_eq!(seen.get(), 42.0);
        assert!(registry.contains(&key(), id));
    }

    #[test]
    fn test_remove_defers_eviction() {
        let mut registry = SubscriptionRegistry::new(subscriber_map_pool(10, 1));
        let (_, callback) = counter();
        let id = SubscriberId::generate();
        registry.add(key(), id, callback);

        assert!(registry.remove(&key(), id).is_some());
        assert!(registry.remove(&key(), id).is_none());
        assert!(registry.has_subscription(&key()));
        assert!(registry.is_empty(&key()));

        registry.evict_emptied().unwrap();
        assert!(!registry.has_subscription(&key()));
        assert_eq!(registry.maps.count_in_pool(), 1);
    }

    #[test]
    fn test_resubscribe_before_eviction_keeps_map() {
        let mut registry = SubscriptionRegistry::new(subscriber_map_pool(10, 1));
        let (_, first) = counter();
        let (_, second) = counter();
        let a = SubscriberId::generate();
        let b = SubscriberId::generate();

        registry.add(key(), a, first);
        registry.remove(&key(), a);
        registry.add(key(), b, second);
        registry.evict_emptied().unwrap();

        assert!(registry.has_subscription(&key()));
        assert_eq!(registry.subscriber_count(&key()), 1);
        assert_eq!(registry.maps.count_created(), 1);
    }

    #[test]
    fn test_evict_if_empty_keeps_populated() {
        let mut registry = SubscriptionRegistry::new(subscriber_map_pool(10, 1));
        let (_, callback) = counter();
        registry.add(key(), SubscriberId::generate(), callback);
        assert!(!registry.evict_if_empty(&key()).unwrap());
        assert_eq!(registry.len(), 1);
    }
}
