//! Status scope module.
//!
//! Provides `StatusScope`, the resolution engine. Intent operations
//! (`apply`, the removals, the subscribe family) only queue work or register
//! callbacks. Each call to [`StatusScope::update`] runs one resolution pass:
//!
//! 1. Expiration sweep
//! 2. Commit pending applies
//! 3. Commit pending removes (cancelling same-tick applies)
//! 4. Recompute aggregates of touched keys
//! 5. Fire lifecycle effects
//! 6. Notify value subscribers
//!
//! Callbacks run with no internal borrow held, so they may call any intent
//! operation on the scope. Those intents land in the queues of the next tick.

use crate::config::ScopeConfig;
use crate::effect::{Cleanup, EffectFactory, EffectRegistry};
use crate::entity::{StatusEntity, StatusKey};
use crate::error::StatusError;
use crate::handle::SubscriptionHandle;
use crate::pool::ObjectPool;
use crate::status::StatusInfo;
use crate::store::EntityStore;
use crate::subscription::{subscriber_map_pool, SubscriptionRegistry, ValueCallback};
use crate::token::{EffectId, EntityToken, SubjectToken, SubscriberId, Tag};
use crate::value::StatusValue;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Everything a live scope owns. `None` inside [`ScopeInner`] once disposed.
struct ScopeState<I: StatusInfo> {
    config: ScopeConfig,
    current_time: Duration,
    store: EntityStore<I>,
    values: HashMap<StatusKey<I::Kind>, StatusValue>,
    /// Alive entities that carry a duration.
    expiring: HashSet<EntityToken>,
    pending_apply: VecDeque<StatusEntity<I>>,
    pending_tokens: HashSet<EntityToken>,
    pending_remove: VecDeque<EntityToken>,
    subscriptions: SubscriptionRegistry<I::Kind>,
    effects: EffectRegistry,
}

/// Per-tick bookkeeping, reused across ticks.
struct TickScratch<K> {
    applied: HashSet<EntityToken>,
    removed: HashSet<EntityToken>,
    /// Touches per key this tick; a canceled apply withdraws its touch.
    modified: HashMap<StatusKey<K>, u32>,
    callbacks: Vec<(SubscriberId, ValueCallback)>,
    /// Factories of canceled entities, dropped once the state is released.
    discarded: Vec<EffectFactory>,
    canceled: usize,
}

impl<K> Default for TickScratch<K> {
    fn default() -> Self {
        Self {
            applied: HashSet::new(),
            removed: HashSet::new(),
            modified: HashMap::new(),
            callbacks: Vec::new(),
            discarded: Vec::new(),
            canceled: 0,
        }
    }
}

impl<K> TickScratch<K> {
    fn clear(&mut self) {
        self.applied.clear();
        self.removed.clear();
        self.modified.clear();
        self.callbacks.clear();
        self.discarded.clear();
        self.canceled = 0;
    }
}

/// Checked-out scratch buffers. Cleared on checkout and on every exit path.
struct ScratchGuard<'a, K>(&'a mut TickScratch<K>);

impl<'a, K> ScratchGuard<'a, K> {
    fn new(scratch: &'a mut TickScratch<K>) -> Self {
        scratch.clear();
        Self(scratch)
    }
}

impl<K> Deref for ScratchGuard<'_, K> {
    type Target = TickScratch<K>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<K> DerefMut for ScratchGuard<'_, K> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<K> Drop for ScratchGuard<'_, K> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

struct ScopeInner<I: StatusInfo> {
    state: RefCell<Option<ScopeState<I>>>,
    scratch: RefCell<TickScratch<I::Kind>>,
}

/// An isolated resolution context.
///
/// `StatusScope` is a cheap, cloneable handle; clones refer to the same
/// scope. Scopes are single-threaded and share no state with each other.
///
/// # Examples
///
/// ```rust
/// use statusfx::{Status, StatusSystem, SubjectToken};
/// use std::time::Duration;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Hp,
/// }
///
/// let system = StatusSystem::<Status<Kind>>::new();
/// let scope = system.create_scope();
/// let player = SubjectToken::from(42);
///
/// let base = scope.apply(player, Status::new(Kind::Hp, 100.0)).unwrap();
/// scope.update(Duration::from_millis(16)).unwrap();
/// assert_eq!(scope.get_status_value(player, Kind::Hp).unwrap(), 100.0);
///
/// scope.apply(player, Status::new(Kind::Hp, -30.0)).unwrap();
/// scope.update(Duration::from_millis(32)).unwrap();
/// assert_eq!(scope.get_status_value(player, Kind::Hp).unwrap(), 70.0);
///
/// scope.remove_by_entity_token(base).unwrap();
/// scope.update(Duration::from_millis(48)).unwrap();
/// assert_eq!(scope.get_status_value(player, Kind::Hp).unwrap(), -30.0);
/// ```
pub struct StatusScope<I: StatusInfo> {
    inner: Rc<ScopeInner<I>>,
}

impl<I: StatusInfo> Clone for StatusScope<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// A non-owning reference to a [`StatusScope`].
///
/// Callbacks stored inside a scope should capture this instead of a
/// `StatusScope` clone to avoid keeping the scope alive through itself.
pub struct WeakStatusScope<I: StatusInfo> {
    inner: Weak<ScopeInner<I>>,
}

impl<I: StatusInfo> Clone for WeakStatusScope<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<I: StatusInfo> WeakStatusScope<I> {
    /// Get the scope back, if it still exists.
    pub fn upgrade(&self) -> Option<StatusScope<I>> {
        self.inner.upgrade().map(|inner| StatusScope { inner })
    }
}

/// Where an effect subscription ended up.
enum EffectBinding<F> {
    Deferred,
    RunNow(F),
    Unknown,
}

impl<I: StatusInfo> StatusScope<I> {
    pub(crate) fn new(config: ScopeConfig) -> Self {
        let capacity = config.pool_initial_capacity;
        let sets = ObjectPool::new(HashSet::new)
            .with_on_release(|set: &mut HashSet<EntityToken>| set.clear())
            .with_max_size(config.pool_max_size)
            .with_capacity(capacity);
        let maps = subscriber_map_pool(config.pool_max_size, capacity);

        let state = ScopeState {
            config,
            current_time: Duration::ZERO,
            store: EntityStore::new(sets),
            values: HashMap::new(),
            expiring: HashSet::new(),
            pending_apply: VecDeque::new(),
            pending_tokens: HashSet::new(),
            pending_remove: VecDeque::new(),
            subscriptions: SubscriptionRegistry::new(maps),
            effects: EffectRegistry::default(),
        };

        Self {
            inner: Rc::new(ScopeInner {
                state: RefCell::new(Some(state)),
                scratch: RefCell::new(TickScratch::default()),
            }),
        }
    }

    /// Create a [`WeakStatusScope`] pointing at this scope.
    pub fn downgrade(&self) -> WeakStatusScope<I> {
        WeakStatusScope {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut ScopeState<I>) -> R,
    ) -> Result<R, StatusError> {
        let mut guard = self
            .inner
            .state
            .try_borrow_mut()
            .map_err(|_| StatusError::ReentrantUpdate)?;
        let state = guard.as_mut().ok_or(StatusError::Disposed)?;
        Ok(f(state))
    }

    /// Like `with_state`, but a scope disposed mid-tick yields `Ok(None)`.
    fn tick_state<R>(
        &self,
        f: impl FnOnce(&mut ScopeState<I>) -> R,
    ) -> Result<Option<R>, StatusError> {
        match self.with_state(f) {
            Ok(value) => Ok(Some(value)),
            Err(StatusError::Disposed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner
            .state
            .try_borrow()
            .map_or(false, |state| state.is_none())
    }

    /// The scope's clock, as set by the last `update` or `update_time`.
    pub fn current_time(&self) -> Result<Duration, StatusError> {
        self.with_state(|state| state.current_time)
    }

    /// Set the clock to `time` and run one resolution pass.
    ///
    /// # Errors
    ///
    /// - [`StatusError::Disposed`] if the scope was disposed.
    /// - [`StatusError::ReentrantUpdate`] if called from a callback of this
    ///   scope's own resolution pass.
    pub fn update(&self, time: Duration) -> Result<(), StatusError> {
        if self.is_disposed() {
            return Err(StatusError::Disposed);
        }
        if self.inner.scratch.try_borrow().is_err() {
            return Err(StatusError::ReentrantUpdate);
        }
        self.update_time(time)?;
        self.dash()
    }

    /// Set the clock without resolving anything.
    ///
    /// Statuses applied afterwards record `time` as their creation time.
    pub fn update_time(&self, time: Duration) -> Result<(), StatusError> {
        self.with_state(|state| state.current_time = time)
    }

    /// Run one resolution pass at the current time.
    pub fn dash(&self) -> Result<(), StatusError> {
        if self.is_disposed() {
            return Err(StatusError::Disposed);
        }
        let mut scratch = self
            .inner
            .scratch
            .try_borrow_mut()
            .map_err(|_| StatusError::ReentrantUpdate)?;
        let mut scratch = ScratchGuard::new(&mut *scratch);

        let now = self.with_state(|state| -> Result<Duration, StatusError> {
            state.sweep_expired();
            state.commit_applies(&mut scratch);
            state.commit_removes(&mut scratch)?;
            state.recompute(&scratch.modified);
            Ok(state.current_time)
        })??;
        scratch.discarded.clear();

        if scratch.modified.is_empty() && scratch.canceled == 0 {
            trace!(time = ?now, "status tick with no changes");
        } else {
            debug!(
                time = ?now,
                applied = scratch.applied.len(),
                removed = scratch.removed.len(),
                canceled = scratch.canceled,
                modified = scratch.modified.len(),
                "resolved status tick"
            );
        }

        if !self.fire_effects(&scratch)? {
            debug!("status scope disposed during effect callbacks");
            return Ok(());
        }
        self.notify_subscribers(&mut scratch)
    }

    /// Step 5. Returns `false` if a callback disposed the scope.
    fn fire_effects(&self, scratch: &TickScratch<I::Kind>) -> Result<bool, StatusError> {
        for &token in &scratch.applied {
            loop {
                let Some(next) = self.tick_state(|state| state.effects.take_next_pending(token))?
                else {
                    return Ok(false);
                };
                let Some((id, factory)) = next else {
                    break;
                };
                let cleanup = factory();
                if self
                    .tick_state(move |state| state.effects.add_cleanup(token, id, cleanup))?
                    .is_none()
                {
                    return Ok(false);
                }
            }
        }

        for &token in &scratch.removed {
            let Some(cleanups) = self.tick_state(|state| state.effects.take_cleanups(token))? else {
                return Ok(false);
            };
            for (_, cleanup) in cleanups.into_iter().flatten() {
                cleanup();
            }
        }
        Ok(true)
    }

    /// Step 6.
    fn notify_subscribers(&self, scratch: &mut TickScratch<I::Kind>) -> Result<(), StatusError> {
        let TickScratch {
            modified,
            callbacks,
            ..
        } = scratch;

        for key in modified.keys() {
            let collected = self.tick_state(|state| -> Result<Option<f32>, StatusError> {
                if !state.subscriptions.has_subscription(key)
                    || state.subscriptions.evict_if_empty(key)?
                {
                    return Ok(None);
                }
                state.subscriptions.snapshot(key, &mut *callbacks);
                Ok(Some(state.value_of(key)))
            })?;
            let value = match collected {
                None => return Ok(()),
                Some(result) => match result? {
                    Some(value) => value,
                    None => continue,
                },
            };

            for (id, callback) in callbacks.drain(..) {
                match self.tick_state(|state| state.subscriptions.contains(key, id))? {
                    None => return Ok(()),
                    Some(false) => continue,
                    Some(true) => invoke(&callback, value),
                }
            }
        }

        match self.tick_state(|state| state.subscriptions.evict_emptied())? {
            Some(result) => result,
            None => Ok(()),
        }
    }

    /// Queue a status for `subject`. It becomes visible on the next tick.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statusfx::{Status, StatusSystem, SubjectToken};
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// enum Kind {
    ///     Atk,
    /// }
    ///
    /// let scope = StatusSystem::<Status<Kind>>::new().create_scope();
    /// let subject = SubjectToken::generate();
    ///
    /// let token = scope.apply(subject, Status::new(Kind::Atk, 20.0)).unwrap();
    /// assert!(scope.is_entity_pending(token).unwrap());
    /// assert_eq!(scope.get_status_value(subject, Kind::Atk).unwrap(), 0.0);
    ///
    /// scope.update(Duration::from_secs(1)).unwrap();
    /// assert!(scope.is_entity_alive(token).unwrap());
    /// assert_eq!(scope.get_status_value(subject, Kind::Atk).unwrap(), 20.0);
    /// ```
    pub fn apply(&self, subject: SubjectToken, info: I) -> Result<EntityToken, StatusError> {
        self.with_state(|state| {
            let entity = StatusEntity::new(state.current_time, info, subject);
            let token = entity.token;
            state.pending_tokens.insert(token);
            state.pending_apply.push_back(entity);
            token
        })
    }

    /// Queue removal of one alive status.
    ///
    /// Tokens that are unknown, already removed or still pending are
    /// ignored. With [`ScopeConfig::include_pending_in_removals`] a pending
    /// token is queued too and the next tick cancels it.
    pub fn remove_by_entity_token(&self, token: EntityToken) -> Result<(), StatusError> {
        self.with_state(|state| {
            let pending = state.config.include_pending_in_removals
                && state.pending_tokens.contains(&token);
            if state.store.contains(token) || pending {
                state.pending_remove.push_back(token);
            }
        })
    }

    /// Queue removal of every alive status at `subject` tagged `tag`.
    pub fn remove_by_tag(&self, subject: SubjectToken, tag: Tag) -> Result<(), StatusError> {
        self.with_state(|state| state.enqueue_removals(subject, |info| info.tag() == tag))
    }

    /// Queue removal of every alive status at `subject`.
    pub fn clean_target(&self, subject: SubjectToken) -> Result<(), StatusError> {
        self.with_state(|state| state.enqueue_removals(subject, |_| true))
    }

    /// Aggregate of `kind` at `subject`, or `0.0` when nothing is alive.
    pub fn get_status_value(
        &self,
        subject: SubjectToken,
        kind: I::Kind,
    ) -> Result<f32, StatusError> {
        self.with_state(|state| state.value_of(&StatusKey::new(subject, kind)))
    }

    /// The cached aggregate with its last-update time.
    pub fn get_status_entry(
        &self,
        subject: SubjectToken,
        kind: I::Kind,
    ) -> Result<Option<StatusValue>, StatusError> {
        self.with_state(|state| state.values.get(&StatusKey::new(subject, kind)).copied())
    }

    /// Whether `token` was applied and awaits the next tick.
    pub fn is_entity_pending(&self, token: EntityToken) -> Result<bool, StatusError> {
        self.with_state(|state| state.pending_tokens.contains(&token))
    }

    /// Whether `token` denotes a committed, alive status.
    pub fn is_entity_alive(&self, token: EntityToken) -> Result<bool, StatusError> {
        self.with_state(|state| state.store.contains(token))
    }

    /// Snapshot of an alive status.
    pub fn entity(&self, token: EntityToken) -> Result<Option<StatusEntity<I>>, StatusError>
    where
        I: Clone,
    {
        self.with_state(|state| state.store.get(token).cloned())
    }

    /// Number of alive statuses.
    pub fn alive_count(&self) -> Result<usize, StatusError> {
        self.with_state(|state| state.store.len())
    }

    /// Number of keys holding a subscription, including ones awaiting
    /// eviction.
    pub fn subscription_count(&self) -> Result<usize, StatusError> {
        self.with_state(|state| state.subscriptions.len())
    }

    /// Number of live subscribers on the aggregate of `kind` at `subject`.
    pub fn subscriber_count(
        &self,
        subject: SubjectToken,
        kind: I::Kind,
    ) -> Result<usize, StatusError> {
        self.with_state(|state| {
            state
                .subscriptions
                .subscriber_count(&StatusKey::new(subject, kind))
        })
    }

    /// Whether any effect, pending or applied, is bound to `token`.
    pub fn has_effects(&self, token: EntityToken) -> Result<bool, StatusError> {
        self.with_state(|state| state.effects.has_effects(token))
    }

    /// Observe the aggregate of `kind` at `subject`.
    ///
    /// `callback` runs during every tick that touches the key. With
    /// `execute_immediately` it also runs once, right now, with the current
    /// value. Disposing the returned handle stops further invocations, even
    /// ones already scheduled for the tick in progress.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statusfx::{Status, StatusSystem, SubjectToken};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// enum Kind {
    ///     Hp,
    /// }
    ///
    /// let scope = StatusSystem::<Status<Kind>>::new().create_scope();
    /// let subject = SubjectToken::generate();
    ///
    /// let seen = Rc::new(Cell::new(-1.0));
    /// let s = Rc::clone(&seen);
    /// let handle = scope
    ///     .subscribe(subject, Kind::Hp, move |v| s.set(v), true)
    ///     .unwrap();
    /// assert_eq!(seen.get(), 0.0);
    ///
    /// scope.apply(subject, Status::new(Kind::Hp, 50.0)).unwrap();
    /// scope.update(Duration::from_secs(1)).unwrap();
    /// assert_eq!(seen.get(), 50.0);
    ///
    /// handle.dispose();
    /// ```
    pub fn subscribe(
        &self,
        subject: SubjectToken,
        kind: I::Kind,
        callback: impl FnMut(f32) + 'static,
        execute_immediately: bool,
    ) -> Result<SubscriptionHandle, StatusError> {
        let key = StatusKey::new(subject, kind);
        let callback: ValueCallback = Rc::new(RefCell::new(callback));
        let (id, value) = self.with_state(|state| {
            let id = SubscriberId::generate();
            state.subscriptions.add(key, id, Rc::clone(&callback));
            (id, state.value_of(&key))
        })?;

        if execute_immediately {
            invoke(&callback, value);
        }
        Ok(self.unsubscribe_handle([(key, id)]))
    }

    /// Subscribe several callbacks in one step and return one handle that
    /// removes all of them at once.
    pub(crate) fn subscribe_all<const N: usize>(
        &self,
        entries: [(StatusKey<I::Kind>, ValueCallback); N],
    ) -> Result<(SubscriptionHandle, [f32; N]), StatusError> {
        let (ids, values) = self.with_state(|state| {
            let ids: [(StatusKey<I::Kind>, SubscriberId); N] = std::array::from_fn(|i| {
                let (key, callback) = &entries[i];
                let id = SubscriberId::generate();
                state.subscriptions.add(*key, id, Rc::clone(callback));
                (*key, id)
            });
            let values = ids.map(|(key, _)| state.value_of(&key));
            (ids, values)
        })?;
        Ok((self.unsubscribe_handle(ids), values))
    }

    fn unsubscribe_handle<const N: usize>(
        &self,
        entries: [(StatusKey<I::Kind>, SubscriberId); N],
    ) -> SubscriptionHandle {
        let scope = self.downgrade();
        SubscriptionHandle::new(move || {
            let Some(scope) = scope.upgrade() else {
                return;
            };
            // A disposed scope already dropped every subscription.
            let removed = scope.with_state(|state| {
                entries.map(|(key, id)| state.subscriptions.remove(&key, id))
            });
            drop(removed);
        })
    }

    /// Bind a side effect to the alive span of the entity `token`.
    ///
    /// `factory` runs when the entity becomes alive (right away if it
    /// already is) and returns a cleanup that runs when the entity is
    /// removed. Effects on the same entity compose; their cleanups run in
    /// registration order. For a token that is neither pending nor alive
    /// this returns an inert handle.
    ///
    /// Disposing the handle withdraws the effect without running its
    /// cleanup; if the entity is still pending the factory never runs.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statusfx::{Status, StatusSystem, SubjectToken};
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// enum Kind {
    ///     Def,
    /// }
    ///
    /// let scope = StatusSystem::<Status<Kind>>::new().create_scope();
    /// let subject = SubjectToken::generate();
    /// let log = Rc::new(RefCell::new(Vec::new()));
    ///
    /// let shield = scope.apply(subject, Status::new(Kind::Def, 10.0)).unwrap();
    /// let l = Rc::clone(&log);
    /// scope
    ///     .subscribe_effect(shield, move || {
    ///         l.borrow_mut().push("raised");
    ///         move || l.borrow_mut().push("lowered")
    ///     })
    ///     .unwrap();
    ///
    /// scope.update(Duration::from_secs(1)).unwrap();
    /// scope.remove_by_entity_token(shield).unwrap();
    /// scope.update(Duration::from_secs(2)).unwrap();
    /// assert_eq!(*log.borrow(), vec!["raised", "lowered"]);
    /// ```
    pub fn subscribe_effect<F, C>(
        &self,
        token: EntityToken,
        factory: F,
    ) -> Result<SubscriptionHandle, StatusError>
    where
        F: FnOnce() -> C + 'static,
        C: FnOnce() + 'static,
    {
        let id = EffectId::generate();
        let binding = self.with_state(|state| {
            if state.pending_tokens.contains(&token) {
                let factory: EffectFactory = Box::new(move || -> Cleanup { Box::new(factory()) });
                state.effects.defer(token, id, factory);
                EffectBinding::Deferred
            } else if state.store.contains(token) {
                EffectBinding::RunNow(factory)
            } else {
                EffectBinding::Unknown
            }
        })?;

        match binding {
            EffectBinding::Deferred => {}
            EffectBinding::RunNow(factory) => {
                // Outside a tick, block one from starting inside the factory.
                // Inside a tick, the running pass already holds the scratch.
                let tick_guard = self.inner.scratch.try_borrow_mut().ok();
                let cleanup: Cleanup = Box::new(factory());
                drop(tick_guard);

                let orphaned = self.with_state(move |state| {
                    if state.store.contains(token) {
                        state.effects.add_cleanup(token, id, cleanup);
                        None
                    } else {
                        Some(cleanup)
                    }
                })?;
                if let Some(cleanup) = orphaned {
                    cleanup();
                    return Ok(SubscriptionHandle::inert());
                }
            }
            EffectBinding::Unknown => {
                warn!(%token, "effect subscribed to an entity that is neither pending nor alive");
                return Ok(SubscriptionHandle::inert());
            }
        }

        let scope = self.downgrade();
        Ok(SubscriptionHandle::new(move || {
            if let Some(scope) = scope.upgrade() {
                let withdrawn = scope.with_state(|state| state.effects.withdraw(token, id));
                drop(withdrawn);
            }
        }))
    }

    /// Tear the scope down. Idempotent.
    ///
    /// Drops every queued and alive status, every subscription and effect,
    /// and every pooled container. No cleanups or callbacks run. All later
    /// operations fail with [`StatusError::Disposed`].
    pub fn dispose(&self) {
        let state = match self.inner.state.try_borrow_mut() {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!("status scope disposed while borrowed; ignoring");
                return;
            }
        };
        if let Some(mut state) = state {
            debug!(
                alive = state.store.len(),
                pending = state.pending_apply.len(),
                subscriptions = state.subscriptions.len(),
                "status scope disposed"
            );
            state.clear();
        }
    }
}

fn invoke(callback: &ValueCallback, value: f32) {
    match callback.try_borrow_mut() {
        Ok(mut callback) => (&mut *callback)(value),
        Err(_) => warn!("value callback re-entered itself; skipping nested call"),
    }
}

impl<I: StatusInfo> ScopeState<I> {
    fn value_of(&self, key: &StatusKey<I::Kind>) -> f32 {
        self.values.get(key).map_or(0.0, |value| value.total)
    }

    fn enqueue_removals(&mut self, subject: SubjectToken, matches: impl Fn(&I) -> bool) {
        for entity in self.store.entities_for_subject(subject) {
            if matches(&entity.info) {
                self.pending_remove.push_back(entity.token);
            }
        }

        if self.config.include_pending_in_removals {
            for entity in &self.pending_apply {
                if entity.subject == subject && matches(&entity.info) {
                    self.pending_remove.push_back(entity.token);
                }
            }
        }
    }

    /// Step 1.
    fn sweep_expired(&mut self) {
        let now = self.current_time;
        for token in &self.expiring {
            if self.store.get(*token).is_some_and(|entity| entity.is_expired(now)) {
                self.pending_remove.push_back(*token);
            }
        }
    }

    /// Step 2.
    fn commit_applies(&mut self, scratch: &mut TickScratch<I::Kind>) {
        let now = self.current_time;
        self.pending_tokens.clear();
        while let Some(entity) = self.pending_apply.pop_front() {
            let token = entity.token;
            let key = entity.key();

            scratch.applied.insert(token);
            *scratch.modified.entry(key).or_insert(0) += 1;
            self.values
                .entry(key)
                .or_insert_with(|| StatusValue::new(0.0, now));
            if entity.info.duration().is_some() {
                self.expiring.insert(token);
                // Window already over: cancel in step 3.
                if entity.is_expired(now) {
                    self.pending_remove.push_back(token);
                }
            }
            self.store.add(entity);
        }
    }

    /// Step 3.
    fn commit_removes(&mut self, scratch: &mut TickScratch<I::Kind>) -> Result<(), StatusError> {
        while let Some(token) = self.pending_remove.pop_front() {
            if scratch.applied.remove(&token) {
                self.cancel(token, scratch)?;
                continue;
            }

            if let Some(entity) = self.store.remove(token)? {
                self.expiring.remove(&token);
                scratch.removed.insert(token);
                *scratch.modified.entry(entity.key()).or_insert(0) += 1;
            }
        }
        Ok(())
    }

    /// Undo a same-tick apply so that no observer ever sees it.
    fn cancel(
        &mut self,
        token: EntityToken,
        scratch: &mut TickScratch<I::Kind>,
    ) -> Result<(), StatusError> {
        scratch.canceled += 1;
        self.expiring.remove(&token);
        if let Some(queue) = self.effects.discard_pending(token) {
            scratch
                .discarded
                .extend(queue.into_iter().map(|(_, factory)| factory));
        }

        let Some(entity) = self.store.remove(token)? else {
            return Ok(());
        };
        let key = entity.key();
        if let Some(touches) = scratch.modified.get_mut(&key) {
            *touches -= 1;
            if *touches == 0 {
                scratch.modified.remove(&key);
                if self.store.by_key(&key).is_none() {
                    self.values.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Step 4.
    fn recompute(&mut self, modified: &HashMap<StatusKey<I::Kind>, u32>) {
        let now = self.current_time;
        for key in modified.keys() {
            let mut entities = self.store.entities_for_key(key).peekable();
            if entities.peek().is_none() {
                self.values.remove(key);
                continue;
            }
            let total: f32 = entities.map(|entity| entity.info.magnitude()).sum();
            self.values.insert(*key, StatusValue::new(total, now));
        }
    }

    fn clear(&mut self) {
        self.pending_apply.clear();
        self.pending_tokens.clear();
        self.pending_remove.clear();
        self.expiring.clear();
        self.values.clear();
        self.store.clear();
        self.subscriptions.clear();
        self.effects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use crate::system::StatusSystem;
    use std::cell::Cell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Hp,
        Atk,
    }

    fn scope() -> StatusScope<Status<Kind>> {
        StatusSystem::new().create_scope()
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_scratch_is_cleared_after_tick() {
        let scope = scope();
        let subject = SubjectToken::generate();
        scope.apply(subject, Status::new(Kind::Hp, 1.0)).unwrap();
        scope.update(secs(1)).unwrap();

        let scratch = scope.inner.scratch.borrow();
        assert!(scratch.applied.is_empty());
        assert!(scratch.modified.is_empty());
        assert!(scratch.callbacks.is_empty());
    }

    #[test]
    fn test_aggregate_slot_follows_membership() {
        let scope = scope();
        let subject = SubjectToken::generate();
        let token = scope.apply(subject, Status::new(Kind::Hp, 5.0)).unwrap();
        scope.update(secs(1)).unwrap();
        assert_eq!(
            scope.get_status_entry(subject, Kind::Hp).unwrap(),
            Some(StatusValue::new(5.0, secs(1)))
        );

        scope.remove_by_entity_token(token).unwrap();
        scope.update(secs(2)).unwrap();
        assert_eq!(scope.get_status_entry(subject, Kind::Hp).unwrap(), None);
    }

    #[test]
    fn test_untouched_keys_keep_their_update_time() {
        let scope = scope();
        let subject = SubjectToken::generate();
        scope.apply(subject, Status::new(Kind::Hp, 5.0)).unwrap();
        scope.update(secs(1)).unwrap();
        scope.apply(subject, Status::new(Kind::Atk, 2.0)).unwrap();
        scope.update(secs(2)).unwrap();

        let hp = scope.get_status_entry(subject, Kind::Hp).unwrap().unwrap();
        let atk = scope.get_status_entry(subject, Kind::Atk).unwrap().unwrap();
        assert_eq!(hp.updated_at, secs(1));
        assert_eq!(atk.updated_at, secs(2));
    }

    #[test]
    fn test_ghost_with_sibling_still_notifies_for_sibling() {
        let config = ScopeConfig {
            include_pending_in_removals: true,
            ..ScopeConfig::default()
        };
        let scope = StatusSystem::<Status<Kind>>::with_config(config)
            .unwrap()
            .create_scope();
        let subject = SubjectToken::generate();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        scope
            .subscribe(subject, Kind::Hp, move |_| c.set(c.get() + 1), false)
            .unwrap();

        scope.apply(subject, Status::new(Kind::Hp, 10.0)).unwrap();
        let ghost = scope.apply(subject, Status::new(Kind::Hp, 99.0)).unwrap();
        scope.remove_by_entity_token(ghost).unwrap();
        scope.update(secs(1)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(scope.get_status_value(subject, Kind::Hp).unwrap(), 10.0);
    }

    #[test]
    fn test_lone_ghost_leaves_no_aggregate_slot() {
        let config = ScopeConfig {
            include_pending_in_removals: true,
            ..ScopeConfig::default()
        };
        let scope = StatusSystem::<Status<Kind>>::with_config(config)
            .unwrap()
            .create_scope();
        let subject = SubjectToken::generate();
        let ghost = scope.apply(subject, Status::new(Kind::Hp, 99.0)).unwrap();
        scope.remove_by_entity_token(ghost).unwrap();
        scope.update(secs(1)).unwrap();

        assert_eq!(scope.get_status_entry(subject, Kind::Hp).unwrap(), None);
        assert!(!scope.is_entity_alive(ghost).unwrap());
        assert!(!scope.is_entity_pending(ghost).unwrap());
    }

    #[test]
    fn test_reentrant_update_is_rejected() {
        let scope = scope();
        let subject = SubjectToken::generate();
        let result = Rc::new(RefCell::new(None));
        let r = Rc::clone(&result);
        let weak = scope.downgrade();
        scope
            .subscribe(
                subject,
                Kind::Hp,
                move |_| {
                    if let Some(scope) = weak.upgrade() {
                        *r.borrow_mut() = Some(scope.update(secs(5)));
                    }
                },
                false,
            )
            .unwrap();

        scope.apply(subject, Status::new(Kind::Hp, 1.0)).unwrap();
        scope.update(secs(1)).unwrap();
        assert_eq!(*result.borrow(), Some(Err(StatusError::ReentrantUpdate)));
    }

    #[test]
    fn test_emptied_subscription_is_evicted_next_pass() {
        let scope = scope();
        let subject = SubjectToken::generate();
        let handle = scope.subscribe(subject, Kind::Hp, |_| {}, false).unwrap();
        assert_eq!(scope.subscription_count().unwrap(), 1);

        handle.dispose();
        assert_eq!(scope.subscription_count().unwrap(), 1);

        scope.update(secs(1)).unwrap();
        assert_eq!(scope.subscription_count().unwrap(), 0);
    }
}
