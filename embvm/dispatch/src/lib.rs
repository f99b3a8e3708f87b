//! # embvm dispatch
//!
//! Executors that decouple submitting work from running it.
//!
//! ## Module Overview
//! - [`queue`]     – [`DispatchQueue`]: a pool of worker threads draining one
//!   shared FIFO of type-erased operations.
//! - [`active`]    – [`ActiveObject`]: one dedicated worker draining a typed
//!   FIFO into the owner's [`Process`] implementation.
//! - [`interrupt`] – [`InterruptQueue`]: a thread-less queue filled from
//!   interrupt top halves and drained by a bottom half.
//! - [`config`]    – Builder-style runtime configuration.
//!
//! Both threaded executors share the worker queue in `worker`, so an active
//! object really is a single-consumer dispatch queue with a typed payload.
//!
//! The threaded executors need the `std` feature (on by default). Without
//! it only [`InterruptQueue`] remains, for bare-metal targets.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
pub mod active;
#[cfg(feature = "std")]
pub mod config;
pub mod error;
pub mod interrupt;
#[cfg(feature = "std")]
pub mod queue;
#[cfg(feature = "std")]
mod worker;

#[cfg(feature = "std")]
pub use active::{ActiveObject, Process};
#[cfg(feature = "std")]
pub use config::{ActiveObjectConfig, DispatchQueueConfig, DispatchQueueConfigBuilder};
pub use error::DispatchError;
pub use interrupt::InterruptQueue;
#[cfg(feature = "std")]
pub use queue::DispatchQueue;

pub use embvm_core::{Dispatcher, FuncOp, InlineOp, Operation};
