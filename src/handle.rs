//! Subscription handles.
//!
//! Every subscribe operation returns a `SubscriptionHandle`. Disposing it
//! undoes exactly that subscription. Dropping a handle does **not**
//! unsubscribe, so fire-and-forget subscriptions are allowed; they live
//! until the scope is disposed.

use std::cell::RefCell;
use std::fmt;

type DisposeAction = Box<dyn FnOnce()>;

/// Handle to a value, effect or modifier subscription.
///
/// # Examples
///
/// ```rust
/// use statusfx::SubscriptionHandle;
///
/// let inert = SubscriptionHandle::inert();
/// assert!(inert.is_disposed());
/// inert.dispose(); // idempotent
/// ```
pub struct SubscriptionHandle {
    action: RefCell<Option<DisposeAction>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// A handle that is already disposed.
    ///
    /// Returned when a subscription could not be made, e.g. an effect bound
    /// to an entity that is neither pending nor alive.
    pub fn inert() -> Self {
        Self {
            action: RefCell::new(None),
        }
    }

    /// Undo the subscription. Calling it again does nothing.
    pub fn dispose(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    /// Whether [`dispose`](Self::dispose) has run, or the handle is inert.
    pub fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
