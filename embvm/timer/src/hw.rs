//! The hardware timer contract.

use alloc::sync::Arc;
use core::time::Duration;

use embvm_core::Ticks;

use crate::error::HwTimerError;

/// Callback a hardware timer invokes when its period elapses.
pub type ExpiryCallback = Arc<dyn Fn() + Send + Sync>;

/// Hardware timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwTimerState {
    Stopped,
    Armed,
    Expired,
}

/// One physical countdown timer.
///
/// The timer counts up from zero when armed and expires once its count
/// reaches the period, invoking the registered callback exactly once. It
/// does not rearm itself.
///
/// The callback may take locks, so implementations must invoke it from a
/// bottom-half or thread context, never from a raw interrupt handler, and
/// never while holding their own internal lock.
pub trait HwTimer: Send + 'static {
    /// Duration of one tick.
    fn resolution(&self) -> Duration;

    /// Arms the timer with the last configured period.
    fn start(&mut self) -> Result<(), HwTimerError>;

    /// Stops the timer. The elapsed count stays readable.
    fn stop(&mut self) -> Result<(), HwTimerError>;

    /// Arms the timer for exactly `period` ticks, counting from zero.
    fn restart(&mut self, period: Ticks) -> Result<(), HwTimerError>;

    /// Ticks elapsed since the timer was last armed.
    fn count(&self) -> Ticks;

    fn state(&self) -> HwTimerState;

    /// Replaces the expiry callback.
    fn register_callback(&mut self, callback: ExpiryCallback);
}
