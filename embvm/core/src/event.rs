//! Signal and event primitives.
//!
//! An event is a small header identifying its kind (the [`Signal`]) plus an
//! optional payload supplied by the application. Events without a payload
//! are cheap stack values; events carrying a payload share it through an
//! `Arc`, so publishing one event to many subscribers never copies the data.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier for an event kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signal(pub u16);

impl Signal {
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for Signal {
    #[inline]
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG({:#06x})", self.0)
    }
}

/// Metadata shared by all events.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    /// Event signal identifier.
    pub signal: Signal,
    /// Whether the event owns a heap-allocated payload.
    pub dynamic: bool,
}

impl EventHeader {
    pub const fn new(signal: Signal) -> Self {
        Self {
            signal,
            dynamic: false,
        }
    }

    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }
}

/// Concrete event type with a strongly typed payload.
#[derive(Debug)]
pub struct Event<T = Option<DynPayload>> {
    pub header: EventHeader,
    pub payload: T,
}

impl<T> Event<T> {
    pub fn new(signal: Signal, payload: T) -> Self {
        Self {
            header: EventHeader::new(signal),
            payload,
        }
    }

    pub fn signal(&self) -> Signal {
        self.header.signal
    }

    pub fn is_dynamic(&self) -> bool {
        self.header.dynamic
    }
}

impl<T: Clone> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            header: self.header,
            payload: self.payload.clone(),
        }
    }
}

/// Type-erased event payload.
pub type DynPayload = Arc<dyn Any + Send + Sync>;

/// The event type delivered to event center subscribers. Signal-only events
/// carry no payload and never allocate.
pub type DynEvent = Event<Option<DynPayload>>;

impl Event<Option<DynPayload>> {
    /// An event that carries only its signal.
    pub const fn empty(signal: Signal) -> Self {
        Self {
            header: EventHeader::new(signal),
            payload: None,
        }
    }

    /// A dynamic event carrying `value` as its payload.
    pub fn with_payload<T: Any + Send + Sync>(signal: Signal, value: T) -> Self {
        Self::with_arc(signal, Arc::new(value))
    }

    /// A dynamic event sharing an existing payload.
    pub fn with_arc(signal: Signal, payload: DynPayload) -> Self {
        Self {
            header: EventHeader::new(signal).with_dynamic(true),
            payload: Some(payload),
        }
    }

    /// Borrows the payload if there is one and it has type `T`.
    pub fn payload_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}
