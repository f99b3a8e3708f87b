//! The event center and its subscription handles.

use alloc::sync::{Arc, Weak};
use core::ptr;

use embvm_core::sync::Mutex;
use embvm_core::{Callback, Dispatcher, DynEvent, Event, InlineDispatcher, Signal, Storage};

use crate::error::EventError;
use crate::storage::{DynamicSubscribers, Subscriber, SubscriberId, SubscriberStorage};

struct Registry<S: SubscriberStorage> {
    table: S::Table,
    next_id: u32,
}

/// Signal to subscriber-list registry.
///
/// `D` runs the callbacks; the default [`InlineDispatcher`] makes publishing
/// synchronous on the publisher's thread. `S` selects static or dynamic
/// registry storage.
///
/// The center always lives in an [`Arc`]: deliveries handed to an
/// asynchronous dispatcher keep a weak reference to it and look their
/// subscription up again right before running, so a subscription removed in
/// the meantime is skipped.
///
/// Subscribing and unsubscribing take the registry lock and must not happen
/// from interrupt context. Publishing holds the lock only while it copies the
/// subscriber list, then hands the copies to the dispatcher with the lock
/// released, so callbacks may subscribe or unsubscribe freely.
pub struct EventCenter<D = InlineDispatcher, S: SubscriberStorage = DynamicSubscribers> {
    this: Weak<Self>,
    dispatcher: D,
    registry: Mutex<Registry<S>>,
}

impl EventCenter {
    /// A dynamic event center that delivers on the publisher's thread.
    pub fn new() -> Arc<Self> {
        Self::with_dispatcher(InlineDispatcher)
    }
}

impl<D: Dispatcher> EventCenter<D> {
    pub fn with_dispatcher(dispatcher: D) -> Arc<Self> {
        Self::with_storage(dispatcher)
    }
}

impl<D: Dispatcher, S: SubscriberStorage> EventCenter<D, S> {
    /// Creates a center whose registry storage is chosen by the `S` type
    /// parameter, e.g.
    /// `EventCenter::<_, StaticSubscribers<8, 4>>::with_storage(dispatcher)`.
    ///
    /// This is the only allocation a static center ever makes.
    pub fn with_storage(dispatcher: D) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: Weak::clone(this),
            dispatcher,
            registry: Mutex::new(Registry {
                table: S::Table::default(),
                next_id: 0,
            }),
        })
    }

    /// Registers `callback` for `signal`.
    ///
    /// # Panics
    ///
    /// Panics if static registry storage is exhausted or the callback does
    /// not fit a static callback slot.
    pub fn subscribe<F>(&self, signal: impl Into<Signal>, callback: F) -> EventHandle<'_, D, S>
    where
        F: Fn(&DynEvent) + Clone + Send + Sync + 'static,
    {
        match self.try_subscribe(signal, callback) {
            Ok(handle) => handle,
            Err(err) => panic!("event center: {err}"),
        }
    }

    /// Registers `callback` for `signal`, reporting exhausted static storage.
    ///
    /// Callbacks are cloned for every delivery, so captured state is usually
    /// shared through an `Arc` or is `Copy`.
    pub fn try_subscribe<F>(
        &self,
        signal: impl Into<Signal>,
        callback: F,
    ) -> Result<EventHandle<'_, D, S>, EventError>
    where
        F: Fn(&DynEvent) + Clone + Send + Sync + 'static,
    {
        let signal = signal.into();
        let callback = S::Callback::from_fn(callback);

        let (id, rejected) = {
            let mut registry = self.registry.lock();
            let id = SubscriberId(registry.next_id);
            registry.next_id = registry.next_id.wrapping_add(1);
            let table = &mut registry.table;

            let index = match find(table.as_slice(), signal) {
                Some(index) => index,
                None => {
                    let capacity = table.capacity_limit().unwrap_or(0);
                    if table.push((signal, S::List::default())).is_err() {
                        return Err(EventError::SignalTableFull { capacity });
                    }
                    table.len() - 1
                }
            };

            let list = &mut table.as_mut_slice()[index].1;
            let capacity = list.capacity_limit().unwrap_or(0);
            match list.push(Subscriber { id, callback }) {
                Ok(()) => (id, None),
                Err(subscriber) => {
                    if list.is_empty() {
                        table.swap_remove(index);
                    }
                    (id, Some((subscriber, capacity)))
                }
            }
        };

        if let Some((_, capacity)) = rejected {
            return Err(EventError::SubscriberListFull { signal, capacity });
        }

        log::debug!("{id} subscribed to {signal}");
        Ok(EventHandle {
            center: self,
            signal,
            id: Some(id),
        })
    }

    /// Removes the subscription behind `handle`.
    ///
    /// Returns `false` if it was already removed or if `handle` belongs to a
    /// different center; neither case is an error.
    pub fn unsubscribe(&self, handle: &mut EventHandle<'_, D, S>) -> bool {
        if !ptr::eq(handle.center, self) {
            log::warn!(
                "unsubscribe from {}: handle belongs to another event center",
                handle.signal
            );
            return false;
        }
        handle.reset()
    }

    /// Delivers `event` to every current subscriber of its signal and
    /// returns how many subscribers it was handed to.
    pub fn publish(&self, event: DynEvent) -> usize
    where
        D: 'static,
    {
        let signal = event.signal();
        let snapshot = {
            let registry = self.registry.lock();
            let mut snapshot = S::List::default();
            if let Some(index) = find(registry.table.as_slice(), signal) {
                for subscriber in registry.table.as_slice()[index].1.as_slice() {
                    // The snapshot has the capacity of the list it copies.
                    let _ = snapshot.push(subscriber.clone());
                }
            }
            snapshot
        };

        log::trace!("publish {signal} to {} subscriber(s)", snapshot.len());
        for subscriber in snapshot.as_slice() {
            let center = Weak::clone(&self.this);
            let subscriber = subscriber.clone();
            let event = event.clone();
            self.dispatcher.dispatch(move || {
                let live = center
                    .upgrade()
                    .is_some_and(|center| center.is_subscribed(signal, subscriber.id));
                if live {
                    subscriber.callback.call(&event);
                }
            });
        }
        snapshot.len()
    }

    /// Publishes an event that carries only `signal`.
    pub fn signal(&self, signal: impl Into<Signal>) -> usize
    where
        D: 'static,
    {
        self.publish(Event::empty(signal.into()))
    }

    pub fn num_subscribers(&self, signal: impl Into<Signal>) -> usize {
        let signal = signal.into();
        let registry = self.registry.lock();
        let table = registry.table.as_slice();
        find(table, signal).map_or(0, |index| table[index].1.len())
    }

    /// Number of distinct signals with at least one subscriber.
    pub fn signal_count(&self) -> usize {
        self.registry.lock().table.len()
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }
}

impl<D, S: SubscriberStorage> EventCenter<D, S> {
    fn is_subscribed(&self, signal: Signal, id: SubscriberId) -> bool {
        let registry = self.registry.lock();
        let table = registry.table.as_slice();
        find(table, signal).is_some_and(|index| {
            table[index]
                .1
                .as_slice()
                .iter()
                .any(|subscriber| subscriber.id == id)
        })
    }

    fn remove(&self, signal: Signal, id: SubscriberId) -> Option<Subscriber<S::Callback>> {
        let mut registry = self.registry.lock();
        let table = &mut registry.table;
        let index = find(table.as_slice(), signal)?;
        let list = &mut table.as_mut_slice()[index].1;
        let at = list
            .as_slice()
            .iter()
            .position(|subscriber| subscriber.id == id)?;
        let removed = list.remove(at);
        if list.is_empty() {
            table.swap_remove(index);
        }
        Some(removed)
    }
}

fn find<L>(table: &[(Signal, L)], signal: Signal) -> Option<usize> {
    table.iter().position(|(entry, _)| *entry == signal)
}

/// Proof of an active subscription.
///
/// Dropping the handle unsubscribes. The handle borrows its center, so it can
/// never outlive it.
#[must_use = "dropping the handle unsubscribes immediately"]
pub struct EventHandle<'c, D, S: SubscriberStorage = DynamicSubscribers> {
    center: &'c EventCenter<D, S>,
    signal: Signal,
    id: Option<SubscriberId>,
}

impl<D, S: SubscriberStorage> EventHandle<'_, D, S> {
    /// Removes the subscription. Returns `false` if it was already removed.
    pub fn reset(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            log::debug!("handle for {} already released", self.signal);
            return false;
        };
        // The callback is dropped here, outside the registry lock.
        let removed = self.center.remove(self.signal, id);
        log::debug!("{id} unsubscribed from {}", self.signal);
        removed.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn id(&self) -> Option<SubscriberId> {
        self.id
    }
}

impl<D, S: SubscriberStorage> Drop for EventHandle<'_, D, S> {
    fn drop(&mut self) {
        self.reset();
    }
}
