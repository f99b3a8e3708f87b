//! # embvm event
//!
//! n:m publish/subscribe with automatic unsubscription.
//!
//! Subscribers register a callback for a [`Signal`] and receive an
//! [`EventHandle`]. Dropping the handle (or calling
//! [`EventHandle::reset`]) removes exactly that subscription, and a removed
//! subscription never fires again. Publishing hands every current subscriber
//! to the center's [`Dispatcher`]: inline by default, or any executor the
//! application supplies.
//!
//! Callbacks must be `Clone`: every delivery runs its own copy. With
//! [`StaticSubscribers`] the copies live inline in the registry and the
//! crate never allocates after the center is created. The crate builds
//! without `std` when the `lock-free` feature is enabled.
//!
//! ```
//! use embvm_event::{EventCenter, Signal};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! const BUTTON: Signal = Signal(0x10);
//!
//! let center = EventCenter::new();
//! let presses = Arc::new(AtomicUsize::new(0));
//! let count = Arc::clone(&presses);
//! let handle = center.subscribe(BUTTON, move |_| {
//!     count.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! assert_eq!(center.signal(BUTTON), 1);
//! drop(handle);
//! assert_eq!(center.signal(BUTTON), 0);
//! assert_eq!(presses.load(Ordering::SeqCst), 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod center;
pub mod error;
pub mod storage;

pub use center::{EventCenter, EventHandle};
pub use error::EventError;
pub use storage::{
    DynamicSubscribers, StaticSubscribers, Subscriber, SubscriberId, SubscriberStorage,
};

pub use embvm_core::{Dispatcher, DynEvent, Event, InlineDispatcher, Signal};
