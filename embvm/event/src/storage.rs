//! Subscriber registry storage.
//!
//! The registry is a table of `(signal, subscriber list)` entries. A
//! [`SubscriberStorage`] picks the containers for both levels and the
//! callback representation: [`DynamicSubscribers`] grows without bound and
//! shares callbacks through the heap, [`StaticSubscribers`] fixes the number
//! of distinct signals, the subscribers per signal and the callback slot size
//! at compile time and never allocates.

use alloc::vec::Vec;
use core::fmt;

use embvm_core::{Callback, DynEvent, InlineFn, SharedFn, Signal, Storage};

/// Identifies one subscription within its center.
///
/// Ids come from a per-center counter, so a removed subscription's id is
/// not handed out again until the counter wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(crate) u32);

impl SubscriberId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// One registered callback.
#[derive(Clone)]
pub struct Subscriber<C> {
    pub(crate) id: SubscriberId,
    pub(crate) callback: C,
}

impl<C> Subscriber<C> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

/// Container choice for the subscriber registry.
pub trait SubscriberStorage: 'static {
    /// How a callback is kept. Cloning it must not allocate.
    type Callback: Callback<DynEvent>;
    /// Subscribers of one signal, in subscription order.
    type List: Storage<Subscriber<Self::Callback>> + Send;
    /// Signal table.
    type Table: Storage<(Signal, Self::List)> + Send;
}

/// Heap-backed registry without limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicSubscribers;

impl SubscriberStorage for DynamicSubscribers {
    type Callback = SharedFn<DynEvent>;
    type List = Vec<Subscriber<Self::Callback>>;
    type Table = Vec<(Signal, Self::List)>;
}

/// Fixed registry of at most `SIGNALS` signals with `SUBS` subscribers each.
/// Callbacks are stored inline in `WORDS` machine words.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticSubscribers<const SIGNALS: usize, const SUBS: usize, const WORDS: usize = 4>;

impl<const SIGNALS: usize, const SUBS: usize, const WORDS: usize> SubscriberStorage
    for StaticSubscribers<SIGNALS, SUBS, WORDS>
{
    type Callback = InlineFn<DynEvent, WORDS>;
    type List = heapless::Vec<Subscriber<Self::Callback>, SUBS>;
    type Table = heapless::Vec<(Signal, Self::List), SIGNALS>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn copied_static_subscriber_runs_the_same_callback() {
        type Slots = StaticSubscribers<1, 1>;
        let hits = Arc::new(AtomicUsize::new(0));
        let tally = Arc::clone(&hits);
        let subscriber = Subscriber {
            id: SubscriberId(9),
            callback: <Slots as SubscriberStorage>::Callback::from_fn(move |_: &DynEvent| {
                tally.fetch_add(1, Ordering::SeqCst);
            }),
        };

        let copy = subscriber.clone();
        let event = DynEvent::empty(Signal(1));
        subscriber.callback.call(&event);
        copy.callback.call(&event);

        assert_eq!(copy.id(), SubscriberId(9));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(copy.id().to_string(), "sub#9");
    }
}
