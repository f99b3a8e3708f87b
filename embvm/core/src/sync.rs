//! Platform abstraction for the registry locks.
//!
//! The event center and timer manager guard their tables with this `Mutex`.
//! With the `std` feature it is a `parking_lot::Mutex`. With `lock-free`, or
//! on `no_std` builds, it becomes a `spin::Mutex`, which never puts the
//! caller to sleep and needs no operating system.
//!
//! Neither flavour poisons, so `lock` is infallible.

#[cfg(not(any(feature = "std", feature = "lock-free")))]
compile_error!("embvm-core needs either the `std` or the `lock-free` feature");

#[cfg(all(feature = "std", not(feature = "lock-free")))]
pub type MutexGuard<'a, T> = parking_lot::MutexGuard<'a, T>;
#[cfg(feature = "lock-free")]
pub type MutexGuard<'a, T> = spin::MutexGuard<'a, T>;

/// Platform-agnostic mutex wrapper.
pub struct Mutex<T> {
    #[cfg(all(feature = "std", not(feature = "lock-free")))]
    inner: parking_lot::Mutex<T>,
    #[cfg(feature = "lock-free")]
    inner: spin::Mutex<T>,
}

impl<T> Mutex<T> {
    /// Creates a new mutex protecting the given value.
    pub const fn new(value: T) -> Self {
        Self {
            #[cfg(all(feature = "std", not(feature = "lock-free")))]
            inner: parking_lot::const_mutex(value),
            #[cfg(feature = "lock-free")]
            inner: spin::Mutex::new(value),
        }
    }

    /// Acquires the mutex, blocking (or spinning) until it becomes available.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    /// Consumes the mutex and returns the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
