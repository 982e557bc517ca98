#![forbid(unsafe_code)]

//! Observable value wrapper with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] owns a value of type `T` and a private
//! [`ChangeNotifier`]. When a write changes the value (determined by
//! `PartialEq`), the version is bumped and every subscriber is notified once
//! with the new value. The notifier itself is never handed out; callers see
//! only [`subscribe`](Observable::subscribe) and the returned
//! [`Subscription`].
//!
//! # Performance
//!
//! | Operation     | Complexity                     |
//! |---------------|--------------------------------|
//! | `get()`       | O(1) + clone of `T`            |
//! | `set()`       | O(S) where S = subscribers     |
//! | `subscribe()` | O(log S)                       |
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: subscribers receive a clone taken after the value
//!   borrow is released, so calling `set()` from a subscriber is allowed.
//!   The nested write notifies before the outer pass resumes.
//! - **Borrow inside `with`/`update`**: calling `set()` from inside the
//!   closure passed to `with()` or `update()` panics (RefCell rules).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::notifier::{ChangeNotifier, ListenerOptions, Subscription};

struct ObservableInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    notifier: ChangeNotifier,
}

/// A shared, version-tracked value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each value-changing write.
/// 2. `set(v)` where `v == current` is a no-op.
/// 3. Subscribers are notified in registration order.
/// 4. Each `subscribe` call is an independent registration.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("subscriber_count", &self.inner.notifier.listener_count())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    /// Get a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify subscribers, unless it equals the current
    /// value.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }
        self.changed();
    }

    /// Modify the value in place. Subscribers are notified only if the
    /// result differs from the value before `f` ran.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let changed = {
            let mut current = self.inner.value.borrow_mut();
            let before = current.clone();
            f(&mut current);
            *current != before
        };
        if changed {
            self.changed();
        }
    }

    /// Subscribe to value changes.
    ///
    /// Every call registers a new adapter listener, so subscribing the same
    /// closure twice yields two subscriptions. Dropping the returned guard
    /// removes exactly this one.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_with(callback, ListenerOptions::default())
    }

    /// Like [`subscribe`](Self::subscribe), with explicit options.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe_with(
        &self,
        callback: impl Fn(&T) + 'static,
        options: ListenerOptions,
    ) -> Subscription {
        let weak = Rc::downgrade(&self.inner);
        self.inner.notifier.subscribe_with(
            move || {
                if let Some(inner) = weak.upgrade() {
                    let value = inner.value.borrow().clone();
                    callback(&value);
                }
            },
            options,
        )
    }

    /// Current version number. Increments by 1 on each value-changing write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.notifier.listener_count()
    }

    /// Drop every subscriber. Later writes still update the value but
    /// notify no one.
    pub fn dispose(&self) {
        self.inner.notifier.dispose();
    }

    fn changed(&self) {
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.notifier.notify_listeners();
    }
}

impl<T: Clone + PartialEq + 'static> From<T> for Observable<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
