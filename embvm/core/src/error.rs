//! Capacity error shared by the fixed-size containers.

use thiserror::Error;

/// A fixed-capacity container could not take another element.
///
/// Static configurations are sized up front, so hitting this is a
/// configuration error. The plain (non-`try_`) operations of every component
/// turn it into a panic.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{what} is full (capacity {capacity})")]
pub struct CapacityError {
    /// Which container overflowed.
    pub what: &'static str,
    /// Its fixed capacity.
    pub capacity: usize,
}

impl CapacityError {
    pub const fn new(what: &'static str, capacity: usize) -> Self {
        Self { what, capacity }
    }
}
