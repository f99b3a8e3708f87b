//! # embvm timer
//!
//! Software timers multiplexed onto a single hardware countdown timer.
//!
//! ## Module Overview
//! - [`hw`]      – The [`HwTimer`] contract a platform timer implements.
//! - [`sim`]     – [`SimTimer`], a hand-stepped timer for simulation and tests.
//! - [`heap`]    – [`ScheduledQueue`], the min-heap of pending timers.
//! - [`manager`] – [`TimerManager`], the reconciliation algorithm.
//! - [`handle`]  – [`TimerHandle`], RAII ownership of one software timer.
//! - [`storage`] – Static (fixed-capacity) or dynamic timer storage.
//!
//! Timers fire in non-decreasing order of expiry. Granularity is the
//! hardware timer's resolution; delays are rounded up to whole ticks so a
//! timer never fires early.
//!
//! Callbacks must be `Clone`. With [`StaticTimers`] they are stored inline
//! and scheduling, firing and cancelling never allocate. The crate builds
//! without `std` when the `lock-free` feature is enabled.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod handle;
pub mod heap;
pub mod hw;
pub mod manager;
pub mod sim;
pub mod storage;

pub use error::{HwTimerError, TimerError};
pub use handle::TimerHandle;
pub use heap::{ScheduledQueue, TimerId};
pub use hw::{ExpiryCallback, HwTimer, HwTimerState};
pub use manager::TimerManager;
pub use sim::SimTimer;
pub use storage::{DynamicTimers, StaticTimers, TimerConfig, TimerStorage};

pub use embvm_core::{Dispatcher, InlineDispatcher, Ticks};
