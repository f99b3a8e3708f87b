//! RAII handle to one allocated software timer.

use core::time::Duration;

use embvm_core::{Dispatcher, InlineDispatcher};

use crate::error::TimerError;
use crate::heap::TimerId;
use crate::hw::HwTimer;
use crate::manager::TimerManager;
use crate::storage::{DynamicTimers, TimerConfig, TimerStorage};

/// Proof of an allocated software timer.
///
/// Dropping the handle cancels a pending schedule and frees the timer, so a
/// callback whose handle is gone never fires. The handle borrows its manager
/// and cannot outlive it.
#[must_use = "dropping the handle frees the timer"]
pub struct TimerHandle<'m, T, D = InlineDispatcher, S = DynamicTimers>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    manager: &'m TimerManager<T, D, S>,
    id: Option<TimerId>,
}

impl<'m, T, D, S> TimerHandle<'m, T, D, S>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    pub(crate) fn new(manager: &'m TimerManager<T, D, S>, id: TimerId) -> Self {
        Self {
            manager,
            id: Some(id),
        }
    }

    /// Runs `callback` once, `delay` from now. A pending schedule is replaced.
    /// A zero delay fires before this call returns (or is dispatched, for
    /// asynchronous dispatchers).
    pub fn async_delay<F>(&self, delay: Duration, callback: F) -> Result<(), TimerError>
    where
        F: Fn() + Clone + Send + Sync + 'static,
    {
        let id = self.id.ok_or(TimerError::InvalidHandle)?;
        self.manager.schedule(id, TimerConfig::Oneshot, delay, callback)
    }

    /// Runs `callback` every `period` until cancelled. A pending schedule is
    /// replaced.
    pub fn periodic_delay<F>(&self, period: Duration, callback: F) -> Result<(), TimerError>
    where
        F: Fn() + Clone + Send + Sync + 'static,
    {
        let id = self.id.ok_or(TimerError::InvalidHandle)?;
        self.manager.schedule(id, TimerConfig::Periodic, period, callback)
    }

    /// Stops the timer. Returns `false` if nothing was pending, including
    /// when the timer already fired.
    ///
    /// A callback that fired but has not run yet on an asynchronous
    /// dispatcher is dropped as well.
    pub fn cancel(&self) -> bool {
        match self.try_cancel() {
            Ok(pending) => pending,
            Err(TimerError::InvalidHandle) => false,
            Err(err) => {
                log::error!("cancel failed: {err}");
                false
            }
        }
    }

    /// Like [`cancel`](Self::cancel), but reports released handles and
    /// hardware timer failures.
    pub fn try_cancel(&self) -> Result<bool, TimerError> {
        let id = self.id.ok_or(TimerError::InvalidHandle)?;
        self.manager.cancel(id)
    }

    /// Whether the handle still owns an allocated timer.
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    /// Whether a schedule is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.id.is_some_and(|id| self.manager.is_pending(id))
    }

    pub fn id(&self) -> Option<TimerId> {
        self.id
    }

    /// Cancels and frees the timer now. Returns `false` if the handle was
    /// already released.
    pub fn reset(&mut self) -> bool {
        match self.id.take() {
            Some(id) => {
                self.manager.release(id);
                true
            }
            None => false,
        }
    }
}

impl<T, D, S> Drop for TimerHandle<'_, T, D, S>
where
    T: HwTimer,
    D: Dispatcher + 'static,
    S: TimerStorage,
{
    fn drop(&mut self) {
        self.reset();
    }
}
