//! Object pool module.
//!
//! The engine creates and discards many small index sets and subscriber
//! maps every tick. `ObjectPool` keeps released containers around so they
//! can be reused with their allocations intact.
//!
//! The pool owns every item it hands out. Callers hold a [`PoolKey`] and
//! reach the item through [`ObjectPool::get_ref`] / [`ObjectPool::get_mut`].
//! Keys are generational: once a key is released it can never reach the
//! slot again, even after the slot is handed out to someone else.

use crate::error::StatusError;
use tracing::trace;

/// Default number of slots reserved up front.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default maximum number of free items kept for reuse.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Handle to an item checked out of an [`ObjectPool`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct PoolKey {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    /// `None` once the item was discarded or cleared.
    value: Option<T>,
    generation: u32,
    active: bool,
}

type Hook<T> = Box<dyn Fn(&mut T)>;

/// A pool of reusable containers.
///
/// # Examples
///
/// ```rust
/// use statusfx::pool::ObjectPool;
///
/// let mut pool = ObjectPool::new(Vec::<u32>::new).with_on_release(|v| v.clear());
///
/// let key = pool.get();
/// pool.get_mut(key).unwrap().push(7);
/// pool.release(key).unwrap();
///
/// // The second checkout reuses the cleared vector.
/// let again = pool.get();
/// assert!(pool.get_ref(again).unwrap().is_empty());
/// assert_eq!(pool.count_created(), 1);
///
/// // Releasing a stale key is a programmer error.
/// assert!(pool.release(key).is_err());
/// ```
pub struct ObjectPool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    vacant: Vec<u32>,
    create: Box<dyn Fn() -> T>,
    on_get: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
    max_size: usize,
    count_created: usize,
}

impl<T> ObjectPool<T> {
    /// Create a pool that builds new items with `create`.
    pub fn new(create: impl Fn() -> T + 'static) -> Self {
        Self {
            slots: Vec::with_capacity(DEFAULT_CAPACITY),
            free: Vec::with_capacity(DEFAULT_CAPACITY),
            vacant: Vec::new(),
            create: Box::new(create),
            on_get: None,
            on_release: None,
            max_size: DEFAULT_MAX_SIZE,
            count_created: 0,
        }
    }

    /// Run `hook` on every item handed out by [`get`](Self::get).
    pub fn with_on_get(mut self, hook: impl Fn(&mut T) + 'static) -> Self {
        self.on_get = Some(Box::new(hook));
        self
    }

    /// Run `hook` on every item passed to [`release`](Self::release).
    pub fn with_on_release(mut self, hook: impl Fn(&mut T) + 'static) -> Self {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Keep at most `max_size` free items (at least one).
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// Reserve room for `capacity` slots.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.slots.reserve(capacity);
        self.free.reserve(capacity.min(self.max_size));
        self
    }

    /// Check an item out of the pool.
    pub fn get(&mut self) -> PoolKey {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.create_item(),
        };

        let slot = &mut self.slots[index as usize];
        slot.active = true;
        if let (Some(hook), Some(value)) = (&self.on_get, slot.value.as_mut()) {
            hook(value);
        }
        PoolKey {
            index,
            generation: slot.generation,
        }
    }

    fn create_item(&mut self) -> u32 {
        let value = Some((self.create)());
        self.count_created += 1;
        trace!(created = self.count_created, "object pool grew");

        match self.vacant.pop() {
            Some(index) => {
                self.slots[index as usize].value = value;
                index
            }
            None => {
                self.slots.push(Slot {
                    value,
                    generation: 0,
                    active: false,
                });
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Return an item to the pool.
    ///
    /// The on-release hook runs first. The item is kept for reuse while the
    /// pool holds fewer than `max_size` free items, otherwise it is dropped.
    ///
    /// # Errors
    ///
    /// [`StatusError::DoubleRelease`] if the key was already released.
    pub fn release(&mut self, key: PoolKey) -> Result<(), StatusError> {
        let slot = match self.slots.get_mut(key.index as usize) {
            Some(slot) if slot.active && slot.generation == key.generation => slot,
            _ => {
                return Err(StatusError::DoubleRelease {
                    index: key.index,
                    generation: key.generation,
                })
            }
        };

        slot.active = false;
        slot.generation = slot.generation.wrapping_add(1);
        if let (Some(hook), Some(value)) = (&self.on_release, slot.value.as_mut()) {
            hook(value);
        }

        if self.free.len() < self.max_size {
            self.free.push(key.index);
        } else {
            slot.value = None;
            self.vacant.push(key.index);
            self.count_created -= 1;
        }
        Ok(())
    }

    /// Borrow a checked-out item. `None` for released keys.
    pub fn get_ref(&self, key: PoolKey) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.active && slot.generation == key.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Mutably borrow a checked-out item. `None` for released keys.
    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.active && slot.generation == key.generation {
            slot.value.as_mut()
        } else {
            None
        }
    }

    /// Items created and not yet discarded (checked out or free).
    pub fn count_created(&self) -> usize {
        self.count_created
    }

    /// Free items waiting for reuse.
    pub fn count_in_pool(&self) -> usize {
        self.free.len()
    }

    /// Items currently checked out.
    pub fn count_active(&self) -> usize {
        self.count_created - self.free.len()
    }

    /// Drop every item, checked out or free, and reset the counters.
    ///
    /// All outstanding keys become stale.
    pub fn clear(&mut self) {
        self.free.clear();
        self.vacant.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            slot.value = None;
            slot.active = false;
            slot.generation = slot.generation.wrapping_add(1);
            self.vacant.push(index as u32);
        }
        self.count_created = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn set_pool() -> ObjectPool<HashSet<u32>> {
        ObjectPool::new(HashSet::new).with_on_release(|set| set.clear())
    }

    #[test]
    fn test_get_creates_then_reuses() {
        let mut pool = set_pool();
        let a = pool.get();
        pool.get_mut(a).unwrap().insert(1);
        assert_eq!(pool.count_created(), 1);
        assert_eq!(pool.count_active(), 1);

        pool.release(a).unwrap();
        assert_eq!(pool.count_in_pool(), 1);
        assert_eq!(pool.count_active(), 0);

        let b = pool.get();
        assert_eq!(pool.count_created(), 1);
        assert!(pool.get_ref(b).unwrap().is_empty());
    }

    #[test]
    fn test_double_release_fails() {
        let mut pool = set_pool();
        let key = pool.get();
        pool.release(key).unwrap();
        assert_eq!(
            pool.release(key),
            Err(StatusError::DoubleRelease {
                index: key.index,
                generation: key.generation,
            })
        );
    }

    #[test]
    fn test_stale_key_cannot_reach_reused_slot() {
        let mut pool = set_pool();
        let old = pool.get();
        pool.release(old).unwrap();

        let new = pool.get();
        pool.get_mut(new).unwrap().insert(5);

        assert!(pool.get_ref(old).is_none());
        assert!(pool.release(old).is_err());
        assert!(pool.get_ref(new).unwrap().contains(&5));
    }

    #[test]
    fn test_hooks_run() {
        let gets = Rc::new(Cell::new(0));
        let releases = Rc::new(Cell::new(0));
        let g = Rc::clone(&gets);
        let r = Rc::clone(&releases);
        let mut pool = ObjectPool::new(Vec::<u8>::new)
            .with_on_get(move |_| g.set(g.get() + 1))
            .with_on_release(move |_| r.set(r.get() + 1));

        let a = pool.get();
        pool.release(a).unwrap();
        let _b = pool.get();

        assert_eq!(gets.get(), 2);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn test_release_beyond_max_size_discards() {
        let mut pool = set_pool().with_max_size(1);
        let a = pool.get();
        let b = pool.get();
        assert_eq!(pool.count_created(), 2);

        pool.release(a).unwrap();
        pool.release(b).unwrap();
        assert_eq!(pool.count_in_pool(), 1);
        assert_eq!(pool.count_created(), 1);

        // The vacant slot is reused for the next fresh item.
        let _c = pool.get();
        let _d = pool.get();
        assert_eq!(pool.count_created(), 2);
        assert_eq!(pool.slots.len(), 2);
    }

    #[test]
    fn test_clear_resets_counters_and_invalidates_keys() {
        let mut pool = set_pool();
        let a = pool.get();
        let b = pool.get();
        pool.release(b).unwrap();

        pool.clear();
        assert_eq!(pool.count_created(), 0);
        assert_eq!(pool.count_in_pool(), 0);
        assert!(pool.get_ref(a).is_none());
        assert!(pool.release(a).is_err());
    }

    #[test]
    fn test_zero_max_size_is_clamped() {
        let mut pool = set_pool().with_max_size(0);
        let a = pool.get();
        pool.release(a).unwrap();
        assert_eq!(pool.count_in_pool(), 1);
    }
}
