//! Derived value module.
//!
//! A `Modifier` combines between one and four aggregates of the same subject
//! through a pure function, e.g. `max_hp * (1 + vitality / 100)`. It can be
//! read directly, or subscribed to so that the host hears about every change
//! of any source.
//!
//! # Examples
//!
//! ```rust
//! use statusfx::{Modifier, Status, StatusSystem, SubjectToken};
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Kind {
//!     Atk,
//!     AtkPercent,
//! }
//!
//! let scope = StatusSystem::<Status<Kind>>::new().create_scope();
//! let hero = SubjectToken::generate();
//!
//! let attack = Modifier::new(hero, [Kind::Atk, Kind::AtkPercent], |[atk, pct]| {
//!     atk * (1.0 + pct / 100.0)
//! });
//!
//! scope.apply(hero, Status::new(Kind::Atk, 40.0)).unwrap();
//! scope.apply(hero, Status::new(Kind::AtkPercent, 50.0)).unwrap();
//! scope.update(Duration::from_secs(1)).unwrap();
//!
//! assert_eq!(attack.get(&scope).unwrap(), 60.0);
//! ```

use crate::entity::StatusKey;
use crate::error::StatusError;
use crate::handle::SubscriptionHandle;
use crate::scope::StatusScope;
use crate::status::{StatusInfo, StatusKind};
use crate::subscription::ValueCallback;
use crate::token::SubjectToken;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A pure combination of `N` aggregates at one subject.
///
/// `N` must be between 1 and 4; other arities fail to compile.
pub struct Modifier<K, const N: usize> {
    subject: SubjectToken,
    kinds: [K; N],
    compute: Rc<dyn Fn([f32; N]) -> f32>,
}

/// Modifier over one source.
pub type Modifier1<K> = Modifier<K, 1>;
/// Modifier over two sources.
pub type Modifier2<K> = Modifier<K, 2>;
/// Modifier over three sources.
pub type Modifier3<K> = Modifier<K, 3>;
/// Modifier over four sources.
pub type Modifier4<K> = Modifier<K, 4>;

impl<K: StatusKind, const N: usize> Clone for Modifier<K, N> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject,
            kinds: self.kinds,
            compute: Rc::clone(&self.compute),
        }
    }
}

impl<K: StatusKind, const N: usize> fmt::Debug for Modifier<K, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("subject", &self.subject)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl<K: StatusKind, const N: usize> Modifier<K, N> {
    const ARITY: () = assert!(N >= 1 && N <= 4, "a modifier combines one to four sources");

    /// Create a modifier over `kinds` at `subject`.
    ///
    /// `compute` receives the source values in the order of `kinds`.
    pub fn new(
        subject: SubjectToken,
        kinds: [K; N],
        compute: impl Fn([f32; N]) -> f32 + 'static,
    ) -> Self {
        let () = Self::ARITY;
        Self {
            subject,
            kinds,
            compute: Rc::new(compute),
        }
    }

    /// Subject whose aggregates feed the modifier.
    pub fn subject(&self) -> SubjectToken {
        self.subject
    }

    /// Source kinds, in the order `compute` receives their values.
    pub fn kinds(&self) -> &[K; N] {
        &self.kinds
    }

    /// Apply the compute function to explicit source values.
    pub fn compute(&self, values: [f32; N]) -> f32 {
        (self.compute)(values)
    }

    /// Current source aggregates, read from `scope`.
    pub fn values<I>(&self, scope: &StatusScope<I>) -> Result<[f32; N], StatusError>
    where
        I: StatusInfo<Kind = K>,
    {
        let mut values = [0.0; N];
        for (value, kind) in values.iter_mut().zip(self.kinds) {
            *value = scope.get_status_value(self.subject, kind)?;
        }
        Ok(values)
    }

    /// Read every source from `scope` and combine them.
    pub fn get<I>(&self, scope: &StatusScope<I>) -> Result<f32, StatusError>
    where
        I: StatusInfo<Kind = K>,
    {
        Ok(self.compute(self.values(scope)?))
    }
}

impl<I: StatusInfo> StatusScope<I> {
    /// Observe a modifier.
    ///
    /// Subscribes once per source. When a source changes the modifier is
    /// recomputed from the new value of that source and the last seen values
    /// of the others, and `on_changed` receives the result. The returned
    /// handle removes all source subscriptions at once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statusfx::{Modifier, Status, StatusSystem, SubjectToken};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use std::time::Duration;
    ///
    /// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// enum Kind {
    ///     Hp,
    ///     Def,
    /// }
    ///
    /// let scope = StatusSystem::<Status<Kind>>::new().create_scope();
    /// let hero = SubjectToken::generate();
    /// let toughness = Modifier::new(hero, [Kind::Hp, Kind::Def], |[hp, def]| hp + def * 2.0);
    ///
    /// let seen = Rc::new(Cell::new(0.0));
    /// let s = Rc::clone(&seen);
    /// scope
    ///     .subscribe_modifier(&toughness, move |v| s.set(v), false)
    ///     .unwrap();
    ///
    /// scope.apply(hero, Status::new(Kind::Hp, 100.0)).unwrap();
    /// scope.update(Duration::from_secs(1)).unwrap();
    /// assert_eq!(seen.get(), 100.0);
    ///
    /// scope.apply(hero, Status::new(Kind::Def, 5.0)).unwrap();
    /// scope.update(Duration::from_secs(2)).unwrap();
    /// assert_eq!(seen.get(), 110.0);
    /// ```
    pub fn subscribe_modifier<const N: usize>(
        &self,
        modifier: &Modifier<I::Kind, N>,
        on_changed: impl FnMut(f32) + 'static,
        execute_immediately: bool,
    ) -> Result<SubscriptionHandle, StatusError> {
        let on_changed = Rc::new(RefCell::new(on_changed));
        let cache = Rc::new(Cell::new([0.0; N]));

        let entries: [(StatusKey<I::Kind>, ValueCallback); N] = std::array::from_fn(|source| {
            let key = StatusKey::new(modifier.subject, modifier.kinds[source]);
            let cache = Rc::clone(&cache);
            let compute = Rc::clone(&modifier.compute);
            let on_changed = Rc::clone(&on_changed);
            let callback: ValueCallback = Rc::new(RefCell::new(move |value: f32| {
                let mut values = cache.get();
                values[source] = value;
                cache.set(values);
                let result = compute(values);
                if let Ok(mut on_changed) = on_changed.try_borrow_mut() {
                    (&mut *on_changed)(result);
                }
            }));
            (key, callback)
        });

        let (handle, initial) = self.subscribe_all(entries)?;
        cache.set(initial);

        if execute_immediately {
            let result = modifier.compute(initial);
            if let Ok(mut on_changed) = on_changed.try_borrow_mut() {
                (&mut *on_changed)(result);
            }
        }
        Ok(handle)
    }
}
