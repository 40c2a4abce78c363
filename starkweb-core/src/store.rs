//! # Reactive Store
//!
//! A minimal observable container holding an immutable `Arc<T>` snapshot. Every
//! transition installs a new snapshot, so subscribers can detect change by identity.
//!
//! Notifications are queued while the snapshot lock is held and drained in the
//! order updates were produced. A listener that updates the store from inside its
//! callback sees its own notification only after the current round has finished.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener<T> = Arc<dyn Fn(&Arc<T>, &Arc<T>) + Send + Sync>;

/// Compares two selected slices; `true` means "unchanged".
pub type EqualityFn<U> = Arc<dyn Fn(&U, &U) -> bool + Send + Sync>;

/// Options for [`Store::subscribe_with_selector`].
pub struct SubscribeOptions<U> {
    /// Invoke the listener once with the current slice right after subscribing.
    pub emit_immediately: bool,
    /// Overrides the default `PartialEq` comparison of slices.
    pub equality_fn: Option<EqualityFn<U>>,
}

impl<U> Default for SubscribeOptions<U> {
    fn default() -> Self {
        Self {
            emit_immediately: false,
            equality_fn: None,
        }
    }
}

impl<U> SubscribeOptions<U> {
    pub fn emit_immediately() -> Self {
        Self {
            emit_immediately: true,
            equality_fn: None,
        }
    }
}

/// A cloneable handle to a shared reactive store.
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

/// A non-owning handle, used by listeners that must not keep the store alive.
pub struct WeakStore<T> {
    inner: Weak<StoreInner<T>>,
}

struct StoreInner<T> {
    state: RwLock<Arc<T>>,
    listeners: RwLock<Vec<(u64, Listener<T>)>>,
    next_listener_id: AtomicU64,
    pending: Mutex<Pending<T>>,
}

struct Pending<T> {
    queue: VecDeque<(Arc<T>, Arc<T>)>,
    draining: bool,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WeakStore<T> {
    pub fn upgrade(&self) -> Option<Store<T>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl<T: Send + Sync + 'static> Store<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(initial)),
                listeners: RwLock::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                pending: Mutex::new(Pending {
                    queue: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Returns the current snapshot.
    pub fn get_state(&self) -> Arc<T> {
        self.inner.state.read().clone()
    }

    /// Replaces the whole snapshot.
    pub fn set_state(&self, next: T) {
        self.replace(Arc::new(next));
    }

    /// Installs `next` unless it is already the current snapshot.
    pub fn replace(&self, next: Arc<T>) {
        self.update(|_| next);
    }

    /// Atomically derives the next snapshot from the current one.
    ///
    /// Returning the same `Arc` that was passed in is a no-op and notifies nobody.
    /// `f` runs under the snapshot lock and must not call back into this store.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Arc<T>) -> Arc<T>,
    {
        let should_drain = {
            let mut state = self.inner.state.write();
            let next = f(&*state);
            if Arc::ptr_eq(&next, &*state) {
                return;
            }
            let previous = std::mem::replace(&mut *state, next.clone());

            let mut pending = self.inner.pending.lock();
            pending.queue.push_back((next, previous));
            !std::mem::replace(&mut pending.draining, true)
        };

        if should_drain {
            self.inner.drain();
        }
    }

    /// Registers a listener invoked with `(next, previous)` after every transition.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<T>, &Arc<T>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.write().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Registers a listener that only fires when the selected slice changes.
    pub fn subscribe_with_selector<U, S, F>(
        &self,
        selector: S,
        listener: F,
        options: SubscribeOptions<U>,
    ) -> Subscription
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        S: Fn(&T) -> U + Send + Sync + 'static,
        F: Fn(&U, &U) + Send + Sync + 'static,
    {
        let equality: EqualityFn<U> = options
            .equality_fn
            .unwrap_or_else(|| Arc::new(|a: &U, b: &U| a == b));

        let current = selector(&self.get_state());
        if options.emit_immediately {
            listener(&current, &current);
        }

        let previous = Mutex::new(current);
        self.subscribe(move |state, _| {
            let next = selector(state);
            let mut slot = previous.lock();
            if equality(&*slot, &next) {
                return;
            }
            let old = std::mem::replace(&mut *slot, next.clone());
            drop(slot);
            listener(&next, &old);
        })
    }

    pub fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

impl<T> StoreInner<T> {
    fn drain(&self) {
        loop {
            let (next, previous) = {
                let mut pending = self.pending.lock();
                match pending.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };

            let listeners: Vec<Listener<T>> = self
                .listeners
                .read()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener(&next, &previous);
            }
        }
    }
}

/// An RAII guard for a store or emitter listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keeps the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.unsubscribe.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
