//! A hand-stepped hardware timer for simulation and deterministic tests.

use alloc::sync::Arc;
use core::time::Duration;

use embvm_core::sync::Mutex;
use embvm_core::Ticks;

use crate::error::HwTimerError;
use crate::hw::{ExpiryCallback, HwTimer, HwTimerState};

struct SimState {
    period: Ticks,
    elapsed: Ticks,
    state: HwTimerState,
    restarts: usize,
    callback: Option<ExpiryCallback>,
}

/// Simulated hardware timer whose clock only moves when
/// [`advance`](SimTimer::advance) is called.
///
/// Clones share the same timer, so a test can keep one clone to drive the
/// clock after handing another to a timer manager.
#[derive(Clone)]
pub struct SimTimer {
    resolution: Duration,
    inner: Arc<Mutex<SimState>>,
}

impl SimTimer {
    pub fn new(resolution: Duration) -> Self {
        Self {
            resolution,
            inner: Arc::new(Mutex::new(SimState {
                period: Ticks::ZERO,
                elapsed: Ticks::ZERO,
                state: HwTimerState::Stopped,
                restarts: 0,
                callback: None,
            })),
        }
    }

    /// A timer ticking once per microsecond.
    pub fn micros() -> Self {
        Self::new(Duration::from_micros(1))
    }

    /// Moves the clock forward by `ticks`.
    ///
    /// Each time the armed period is reached the timer expires and the
    /// callback runs with no lock held. If the callback rearms the timer, the
    /// remaining ticks keep counting against the new period, so one call may
    /// fire several times.
    pub fn advance(&self, ticks: Ticks) {
        let mut left = ticks;
        loop {
            let callback = {
                let mut sim = self.inner.lock();
                if sim.state != HwTimerState::Armed {
                    break;
                }
                let remaining = sim.period.saturating_sub(sim.elapsed);
                if left < remaining {
                    sim.elapsed = sim.elapsed.saturating_add(left);
                    break;
                }
                left = left.saturating_sub(remaining);
                sim.elapsed = sim.period;
                sim.state = HwTimerState::Expired;
                sim.callback.clone()
            };
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    /// Armed period, if the timer is counting.
    pub fn armed_period(&self) -> Option<Ticks> {
        let sim = self.inner.lock();
        (sim.state == HwTimerState::Armed).then_some(sim.period)
    }

    /// How many times the timer has been armed.
    pub fn restart_count(&self) -> usize {
        self.inner.lock().restarts
    }
}

impl HwTimer for SimTimer {
    fn resolution(&self) -> Duration {
        self.resolution
    }

    fn start(&mut self) -> Result<(), HwTimerError> {
        let mut sim = self.inner.lock();
        if sim.period.is_zero() {
            return Err(HwTimerError::InvalidPeriod);
        }
        sim.elapsed = Ticks::ZERO;
        sim.state = HwTimerState::Armed;
        sim.restarts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HwTimerError> {
        let mut sim = self.inner.lock();
        if sim.state == HwTimerState::Armed {
            sim.state = HwTimerState::Stopped;
        }
        Ok(())
    }

    fn restart(&mut self, period: Ticks) -> Result<(), HwTimerError> {
        self.inner.lock().period = period;
        self.start()
    }

    fn count(&self) -> Ticks {
        self.inner.lock().elapsed
    }

    fn state(&self) -> HwTimerState {
        self.inner.lock().state
    }

    fn register_callback(&mut self, callback: ExpiryCallback) {
        self.inner.lock().callback = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_exactly_at_period_boundary() {
        let mut timer = SimTimer::micros();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        timer.register_callback(Arc::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        timer.restart(Ticks(10)).unwrap();
        timer.advance(Ticks(9));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.count(), Ticks(9));

        timer.advance(Ticks(5));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), HwTimerState::Expired);
        assert_eq!(timer.count(), Ticks(10));
    }

    #[test]
    fn stopped_timer_keeps_its_count() {
        let mut timer = SimTimer::micros();
        timer.restart(Ticks(100)).unwrap();
        timer.advance(Ticks(30));
        timer.stop().unwrap();
        timer.advance(Ticks(30));

        assert_eq!(timer.state(), HwTimerState::Stopped);
        assert_eq!(timer.count(), Ticks(30));
        assert_eq!(timer.armed_period(), None);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut timer = SimTimer::micros();
        assert_eq!(timer.start(), Err(HwTimerError::InvalidPeriod));
        assert_eq!(timer.restart(Ticks::ZERO), Err(HwTimerError::InvalidPeriod));
    }
}
