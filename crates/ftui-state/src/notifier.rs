#![forbid(unsafe_code)]

//! Ordered listener registry with synchronous broadcast.
//!
//! # Design
//!
//! [`ChangeNotifier`] keeps its registry in shared, reference-counted
//! storage (`Rc<RefCell<..>>`). Cloning a notifier yields another handle to
//! the same registry. Listeners are [`Listener`] handles compared by
//! allocation, so registering the same handle twice updates its
//! [`ListenerOptions`] instead of adding a second entry.
//!
//! The registry is a hash map keyed by listener identity plus a `BTreeMap`
//! from insertion sequence to key. The sequence map fixes dispatch order;
//! the hash map answers membership checks during dispatch.
//!
//! # Dispatch
//!
//! `notify_listeners()` snapshots the ordered `(sequence, listener)` pairs
//! and walks the snapshot. Before each call it checks that the listener is
//! still registered under the same sequence number, so a listener removed
//! by an earlier one in the same pass is skipped and listeners added during
//! the pass wait for the next one. No borrow is held while a listener runs:
//! listeners may add or remove listeners, notify re-entrantly, or dispose
//! the notifier.
//!
//! # Failure Modes
//!
//! None by contract. Operations on a disposed notifier and removal of an
//! unknown listener are silent no-ops.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

// Import tracing macros (no-op when tracing feature is disabled).
#[cfg(feature = "tracing")]
use crate::logging::trace;
#[cfg(not(feature = "tracing"))]
use crate::trace;

/// A zero-argument callback with identity.
///
/// Clones refer to the same listener. Two independently created listeners
/// are always distinct, even when built from the same closure.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn()>);

impl Listener {
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self(Rc::new(callback))
    }

    /// Whether `self` and `other` are handles to the same listener.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    fn key(&self) -> ListenerKey {
        ListenerKey(Rc::as_ptr(&self.0).cast::<()>() as usize)
    }

    fn call(&self) {
        (self.0)();
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&format_args!("{:#x}", self.key().0))
            .finish()
    }
}

/// Per-listener registration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
    /// Unregister the listener as part of its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub const ONCE: Self = Self { once: true };
}

/// Listener identity: the address of its shared allocation. Stable for as
/// long as the registry holds a clone of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ListenerKey(usize);

struct Entry {
    listener: Listener,
    options: ListenerOptions,
    seq: u64,
}

#[derive(Default)]
struct Registry {
    entries: AHashMap<ListenerKey, Entry>,
    order: BTreeMap<u64, ListenerKey>,
    next_seq: u64,
    disposed: bool,
}

impl Registry {
    fn insert(&mut self, listener: &Listener, options: ListenerOptions) {
        let key = listener.key();
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.options = options;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key);
        self.entries.insert(
            key,
            Entry {
                listener: listener.clone(),
                options,
                seq,
            },
        );
    }

    fn remove(&mut self, key: ListenerKey) -> Option<Entry> {
        let entry = self.entries.remove(&key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }
}

/// Generic publish/subscribe primitive with a terminal disposed state.
///
/// # Invariants
///
/// 1. Listeners are invoked in registration order.
/// 2. A listener appears at most once in the registry.
/// 3. After [`dispose()`](Self::dispose) the registry is empty forever and
///    every mutating call is a no-op.
/// 4. `has_listeners()` is `false` whenever the notifier is disposed.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Rc<RefCell<Registry>>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` with default options.
    pub fn add_listener(&self, listener: &Listener) {
        self.add_listener_with(listener, ListenerOptions::default());
    }

    /// Register `listener`, or update its options if it is already
    /// registered. The listener keeps its original dispatch position.
    pub fn add_listener_with(&self, listener: &Listener, options: ListenerOptions) {
        let mut registry = self.inner.borrow_mut();
        if registry.disposed {
            return;
        }
        registry.insert(listener, options);
    }

    /// Unregister `listener`. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Listener) {
        self.unregister(listener.key());
    }

    #[must_use]
    pub fn has_listener(&self, listener: &Listener) -> bool {
        self.inner.borrow().entries.contains_key(&listener.key())
    }

    #[must_use]
    pub fn has_listeners(&self) -> bool {
        let registry = self.inner.borrow();
        !registry.disposed && !registry.entries.is_empty()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Invoke every registered listener once, in registration order.
    pub fn notify_listeners(&self) {
        let pass: Vec<(u64, Listener)> = {
            let registry = self.inner.borrow();
            if registry.disposed {
                return;
            }
            registry
                .order
                .iter()
                .filter_map(|(seq, key)| {
                    registry
                        .entries
                        .get(key)
                        .map(|entry| (*seq, entry.listener.clone()))
                })
                .collect()
        };
        trace!(listeners = pass.len(), "notify_listeners");

        for (seq, listener) in pass {
            let once = {
                let registry = self.inner.borrow();
                match registry.entries.get(&listener.key()) {
                    Some(entry) if entry.seq == seq => entry.options.once,
                    // Removed, or removed and re-added, earlier in this pass.
                    _ => continue,
                }
            };
            if once {
                self.unregister(listener.key());
            }
            listener.call();
        }
    }

    /// Clear the registry and silence this notifier permanently.
    pub fn dispose(&self) {
        let retired = {
            let mut registry = self.inner.borrow_mut();
            if registry.disposed {
                return;
            }
            registry.disposed = true;
            registry.order.clear();
            std::mem::take(&mut registry.entries)
        };
        trace!(listeners = retired.len(), "notifier disposed");
        // Listener closures are dropped outside the borrow; their captures
        // may touch this notifier from `Drop`.
        drop(retired);
    }

    /// Wrap `callback` in a fresh [`Listener`], register it, and return a
    /// guard that unregisters it on drop.
    #[must_use = "dropping the Subscription unregisters the listener"]
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        self.subscribe_with(callback, ListenerOptions::default())
    }

    /// Like [`subscribe`](Self::subscribe), with explicit options.
    #[must_use = "dropping the Subscription unregisters the listener"]
    pub fn subscribe_with(
        &self,
        callback: impl Fn() + 'static,
        options: ListenerOptions,
    ) -> Subscription {
        let listener = Listener::new(callback);
        self.add_listener_with(&listener, options);
        Subscription {
            notifier: Rc::downgrade(&self.inner),
            listener: Some(listener),
        }
    }

    fn unregister(&self, key: ListenerKey) {
        let removed = {
            let mut registry = self.inner.borrow_mut();
            if registry.disposed {
                return;
            }
            registry.remove(key)
        };
        drop(removed);
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.borrow();
        f.debug_struct("ChangeNotifier")
            .field("listener_count", &registry.entries.len())
            .field("disposed", &registry.disposed)
            .finish()
    }
}

/// The listener surface a view layer binds to.
///
/// Implementors expose one [`ChangeNotifier`]; everything else is provided.
/// A view adapter registers its redraw trigger on mount and removes it (or
/// disposes the object) on unmount.
pub trait Listenable {
    fn notifier(&self) -> &ChangeNotifier;

    fn add_listener(&self, listener: &Listener) {
        self.notifier().add_listener(listener);
    }

    fn add_listener_with(&self, listener: &Listener, options: ListenerOptions) {
        self.notifier().add_listener_with(listener, options);
    }

    fn remove_listener(&self, listener: &Listener) {
        self.notifier().remove_listener(listener);
    }

    fn has_listener(&self, listener: &Listener) -> bool {
        self.notifier().has_listener(listener)
    }

    fn has_listeners(&self) -> bool {
        self.notifier().has_listeners()
    }

    fn dispose(&self) {
        self.notifier().dispose();
    }

    /// Register `callback` under a fresh listener, scoped to the returned
    /// guard.
    fn listen(&self, callback: impl Fn() + 'static) -> Subscription
    where
        Self: Sized,
    {
        self.notifier().subscribe(callback)
    }
}

impl Listenable for ChangeNotifier {
    fn notifier(&self) -> &ChangeNotifier {
        self
    }
}

/// RAII guard for a registered listener.
///
/// Dropping the guard (or calling [`unsubscribe`](Self::unsubscribe))
/// removes exactly the listener it was created for. The guard holds the
/// notifier weakly and never keeps it alive.
pub struct Subscription {
    notifier: Weak<RefCell<Registry>>,
    listener: Option<Listener>,
}

impl Subscription {
    /// Unregister the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Give up the guard, leaving the listener registered for as long as
    /// the notifier lives.
    pub fn detach(mut self) {
        self.listener = None;
    }

    /// Whether the listener is still registered on a live notifier.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match (&self.listener, self.notifier.upgrade()) {
            (Some(listener), Some(inner)) => inner.borrow().entries.contains_key(&listener.key()),
            _ => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let (Some(listener), Some(inner)) = (self.listener.take(), self.notifier.upgrade()) {
            ChangeNotifier { inner }.remove_listener(&listener);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
