use embvm_core::Signal;
use thiserror::Error;

/// Errors reported by [`EventCenter::try_subscribe`](crate::EventCenter::try_subscribe).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    #[error("signal table is full (capacity {capacity})")]
    SignalTableFull { capacity: usize },

    #[error("subscriber list for {signal} is full (capacity {capacity})")]
    SubscriberListFull { signal: Signal, capacity: usize },
}
