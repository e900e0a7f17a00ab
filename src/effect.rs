//! Lifecycle effect registry.
//!
//! Effects are host side effects bound to one entity's alive span. An effect
//! factory runs when the entity becomes alive and returns a cleanup that
//! runs when the entity is removed. Several effects on one entity compose
//! as an ordered list; each can be withdrawn by its id.

use crate::token::{EffectId, EntityToken};
use std::collections::{HashMap, VecDeque};

/// Runs once when the entity bound to it is removed.
pub(crate) type Cleanup = Box<dyn FnOnce()>;

/// Runs once when the entity bound to it becomes alive.
pub(crate) type EffectFactory = Box<dyn FnOnce() -> Cleanup>;

#[derive(Default)]
pub(crate) struct EffectRegistry {
    /// Factories waiting for their entity to be committed.
    pending: HashMap<EntityToken, VecDeque<(EffectId, EffectFactory)>>,
    /// Cleanups of effects whose entity is alive, in registration order.
    cleanups: HashMap<EntityToken, Vec<(EffectId, Cleanup)>>,
}

impl EffectRegistry {
    pub(crate) fn defer(&mut self, token: EntityToken, id: EffectId, factory: EffectFactory) {
        self.pending.entry(token).or_default().push_back((id, factory));
    }

    /// Pop the oldest factory still waiting on `token`.
    pub(crate) fn take_next_pending(&mut self, token: EntityToken) -> Option<(EffectId, EffectFactory)> {
        let queue = self.pending.get_mut(&token)?;
        let next = queue.pop_front();
        if queue.is_empty() {
            self.pending.remove(&token);
        }
        next
    }

    /// Drop every factory waiting on `token`. Used when the entity is
    /// canceled before it ever became alive.
    pub(crate) fn discard_pending(
        &mut self,
        token: EntityToken,
    ) -> Option<VecDeque<(EffectId, EffectFactory)>> {
        self.pending.remove(&token)
    }

    pub(crate) fn add_cleanup(&mut self, token: EntityToken, id: EffectId, cleanup: Cleanup) {
        self.cleanups.entry(token).or_default().push((id, cleanup));
    }

    /// Take the composed cleanups of a removed entity.
    pub(crate) fn take_cleanups(&mut self, token: EntityToken) -> Option<Vec<(EffectId, Cleanup)>> {
        self.cleanups.remove(&token)
    }

    /// Withdraw one effect, pending or applied, without running it.
    ///
    /// Returns whatever was registered under `id` so the caller can drop it
    /// outside any borrow of the registry.
    pub(crate) fn withdraw(
        &mut self,
        token: EntityToken,
        id: EffectId,
    ) -> (Option<EffectFactory>, Option<Cleanup>) {
        (self.withdraw_pending(token, id), self.withdraw_cleanup(token, id))
    }

    fn withdraw_pending(&mut self, token: EntityToken, id: EffectId) -> Option<EffectFactory> {
        let queue = self.pending.get_mut(&token)?;
        let pos = queue.iter().position(|(effect, _)| *effect == id)?;
        let (_, factory) = queue.remove(pos)?;
        if queue.is_empty() {
            self.pending.remove(&token);
        }
        Some(factory)
    }

    fn withdraw_cleanup(&mut self, token: EntityToken, id: EffectId) -> Option<Cleanup> {
        let list = self.cleanups.get_mut(&token)?;
        let pos = list.iter().position(|(effect, _)| *effect == id)?;
        let (_, cleanup) = list.remove(pos);
        if list.is_empty() {
            self.cleanups.remove(&token);
        }
        Some(cleanup)
    }

    pub(crate) fn has_effects(&self, token: EntityToken) -> bool {
        self.pending.contains_key(&token) || self.cleanups.contains_key(&token)
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.cleanups.clear();
    }
}
