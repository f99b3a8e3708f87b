//! # embvm core
//!
//! Types and abstractions shared by the embvm asynchronous execution
//! components: the dispatch queue, the active object, the event center and
//! the timer manager.
//!
//! ## Module Overview
//! - [`event`]      – Signals and events routed through the event center.
//! - [`dispatcher`] – The `Dispatcher` contract that decouples where a
//!   callback is triggered from where it runs.
//! - [`queue`]      – Bounded (no heap) and unbounded FIFO queues plus the
//!   matching growable/fixed storage used by registries.
//! - [`func`]       – The function queue: type-erased callables, boxed or
//!   stored inline in fixed slots, plus repeatable registry callbacks.
//! - [`time`]       – Hardware tick counts.
//! - [`sync`]       – Platform mutex used by the registries.
//!
//! Static (fixed-capacity) and dynamic memory are never chosen by a runtime
//! flag. Each component is generic over its storage and the caller picks the
//! concrete type. The fixed-capacity variants never allocate after
//! construction, and the crate builds without `std` (enable `lock-free`).

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(unsafe_code)] // InlineOp and InlineFn store closures in raw, fixed-size slots

extern crate alloc;

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod func;
pub mod queue;
pub mod sync;
pub mod time;

pub use dispatcher::{Dispatcher, FnDispatcher, InlineDispatcher};
pub use error::CapacityError;
pub use event::{DynEvent, DynPayload, Event, EventHeader, Signal};
pub use func::{
    Callback, DynamicFunctionQueue, FuncOp, FunctionQueue, InlineFn, InlineOp, Operation,
    SharedFn, StaticFunctionQueue,
};
pub use queue::{BoundedQueue, OpQueue, Storage, UnboundedQueue};
pub use time::Ticks;

/// Framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
